//! Tournament bracket manager: models, bracket logic, store interface, and transactions.

pub mod config;
pub mod logic;
pub mod models;
pub mod service;
pub mod store;
pub mod sync;

pub use config::ServerConfig;
pub use logic::{
    ensure_can_join, ensure_can_leave, ensure_declarable, ensure_organizer, entry_for,
    generate_bracket, invite_candidates, invite_member, leave_team, record_result, remove_member,
    set_winner, start_tournament, Advancement, LeaveOutcome, OrganizerAction,
};
pub use models::{
    sanitize_username, AccountId, Match, MatchId, Participant, Player, Principal, ProfileStats,
    Team, TeamMember, Tournament, TournamentError, TournamentId, TournamentKind, TournamentRules,
    TournamentStatus, UserProfile, BYE_ID, MAX_TEAM_SIZE,
};
pub use service::TournamentService;
pub use store::{DocumentStore, MemoryBlobStore, MemoryStore, Subscription};
pub use sync::TournamentView;
