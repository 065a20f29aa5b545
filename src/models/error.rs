//! Errors that can occur during tournament operations.

use thiserror::Error;

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum TournamentError {
    /// Generation or start attempted with fewer than 2 participants.
    #[error("Need at least 2 participants to generate a bracket")]
    InsufficientParticipants,

    /// Winner declared on a match with an empty/bye slot, an existing winner, or an outsider.
    #[error("Invalid winner declaration: {0}")]
    InvalidWinnerDeclaration(String),

    /// Organizer-only action attempted by someone else (or captain-only by a non-captain).
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Already registered in this tournament")]
    AlreadyRegistered,

    #[error("Not registered in this tournament")]
    NotRegistered,

    #[error("Team is full")]
    TeamFull,

    #[error("Player is already a team member")]
    AlreadyMember,

    /// Tournament is not in a state that allows this action.
    #[error("Invalid state for this action")]
    InvalidState,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Username must be at least 3 valid characters")]
    InvalidUsername,

    #[error("Username is already taken")]
    UsernameTaken,

    /// A version precondition failed: someone else wrote the document first.
    #[error("Document changed concurrently, reload and retry")]
    StaleWrite,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed document: {0}")]
    Codec(String),
}

impl TournamentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        TournamentError::NotFound(what.into())
    }

    pub fn invalid_winner(reason: impl Into<String>) -> Self {
        TournamentError::InvalidWinnerDeclaration(reason.into())
    }

    /// Failures the user may simply re-trigger.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TournamentError::StoreUnavailable(_) | TournamentError::StaleWrite
        )
    }
}

impl From<serde_json::Error> for TournamentError {
    fn from(e: serde_json::Error) -> Self {
        TournamentError::Codec(e.to_string())
    }
}
