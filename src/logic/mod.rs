//! Tournament business logic: bracket generation, advancement, roster, access checks.

mod access;
mod advance;
mod bracket;
mod roster;
mod setup;

pub use access::{ensure_can_join, ensure_can_leave, ensure_declarable, ensure_organizer, OrganizerAction};
pub use advance::{record_result, set_winner, Advancement};
pub use bracket::generate_bracket;
pub use roster::{entry_for, invite_candidates, invite_member, leave_team, remove_member, LeaveOutcome};
pub use setup::start_tournament;
