//! Data structures for tournaments: participants, matches, profiles, errors.

mod error;
mod game;
mod participant;
mod profile;
mod tournament;

pub use error::TournamentError;
pub use game::{Match, MatchId};
pub use participant::{
    AccountId, Participant, Player, Team, TeamMember, BYE_ID, MAX_TEAM_SIZE, TEAM_COLORS,
};
pub use profile::{sanitize_username, Principal, ProfileStats, UserProfile, MIN_USERNAME_LEN};
pub use tournament::{
    Tournament, TournamentId, TournamentKind, TournamentRules, TournamentStatus,
};
