//! Tournament, TournamentKind, and TournamentStatus.

use crate::models::error::TournamentError;
use crate::models::game::{Match, MatchId};
use crate::models::participant::{AccountId, Participant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

/// Format of the tournament; decides whether entries are individuals or teams.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum TournamentKind {
    #[default]
    #[serde(rename = "1v1 Duel")]
    Duel,
    #[serde(rename = "4v4 HvV")]
    TeamVsTeam,
    #[serde(rename = "Free-for-All")]
    FreeForAll,
}

impl TournamentKind {
    pub fn is_team_mode(self) -> bool {
        matches!(self, TournamentKind::TeamVsTeam)
    }
}

/// Lifecycle phase. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Roster open; no bracket yet.
    #[default]
    Setup,
    /// Bracket generated; results being reported.
    InProgress,
    /// Final decided.
    Completed,
}

/// Organizer-editable settings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TournamentRules {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub banned_items: Vec<String>,
}

impl TournamentRules {
    /// Trimmed copy with blank and repeated banned items dropped.
    pub fn normalized(&self) -> Self {
        let mut banned_items: Vec<String> = Vec::new();
        for item in &self.banned_items {
            let item = item.trim();
            if !item.is_empty() && !banned_items.iter().any(|b| b == item) {
                banned_items.push(item.to_string());
            }
        }
        Self {
            description: self.description.trim().to_string(),
            schedule: self.schedule.trim().to_string(),
            banned_items,
        }
    }
}

/// Full tournament record as stored in `tournaments/{id}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub kind: TournamentKind,
    pub organizer_id: AccountId,
    pub organizer_username: String,
    #[serde(default)]
    pub organizer_photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: TournamentStatus,
    /// Bracket entries in join order.
    #[serde(default)]
    pub players: Vec<Participant>,
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub is_bracket_generated: bool,
    #[serde(default)]
    pub tournament_winner: Option<Participant>,
    #[serde(default)]
    pub invite_token: Option<String>,
    #[serde(default)]
    pub rules: Option<TournamentRules>,
}

impl Tournament {
    /// Create a new tournament in Setup state with no players.
    pub fn new(
        name: impl Into<String>,
        kind: TournamentKind,
        organizer_id: impl Into<AccountId>,
        organizer_username: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            organizer_id: organizer_id.into(),
            organizer_username: organizer_username.into(),
            organizer_photo_url: None,
            created_at: Utc::now(),
            status: TournamentStatus::Setup,
            players: Vec::new(),
            matches: Vec::new(),
            is_bracket_generated: false,
            tournament_winner: None,
            invite_token: None,
            rules: None,
        }
    }

    /// Create a tournament with initial entries. Still in Setup until started.
    pub fn with_players(
        name: impl Into<String>,
        kind: TournamentKind,
        organizer_id: impl Into<AccountId>,
        players: Vec<Participant>,
    ) -> Self {
        let organizer_id = organizer_id.into();
        Self {
            players,
            ..Self::new(name, kind, organizer_id.clone(), organizer_id)
        }
    }

    pub fn is_organizer(&self, uid: &str) -> bool {
        self.organizer_id == uid
    }

    /// Entry with this participant id.
    pub fn get_player(&self, id: &str) -> Option<&Participant> {
        self.players.iter().find(|p| p.id() == id)
    }

    /// Entry `uid` competes under: their own, or the team they are on.
    pub fn entry_of(&self, uid: &str) -> Option<&Participant> {
        self.players.iter().find(|p| p.includes(uid))
    }

    pub fn is_registered(&self, uid: &str) -> bool {
        self.entry_of(uid).is_some()
    }

    /// Every account represented by the current roster, teams flattened.
    pub fn member_ids(&self) -> Vec<AccountId> {
        self.players.iter().flat_map(Participant::member_ids).collect()
    }

    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    /// Round count baked into the bracket at generation (0 before generation).
    pub fn total_rounds(&self) -> u32 {
        self.matches.iter().map(|m| m.round).max().unwrap_or(0)
    }

    /// Round-1 capacity of the generated bracket (0 before generation).
    pub fn bracket_size(&self) -> u32 {
        match self.total_rounds() {
            0 => 0,
            rounds => 1 << rounds,
        }
    }

    /// Add an entry (Setup only). Ids must be unique.
    pub fn add_player(&mut self, participant: Participant) -> Result<(), TournamentError> {
        if self.status != TournamentStatus::Setup {
            return Err(TournamentError::InvalidState);
        }
        let uid = participant.id().to_string();
        if self.get_player(&uid).is_some() || self.is_registered(&uid) {
            return Err(TournamentError::AlreadyRegistered);
        }
        self.players.push(participant);
        Ok(())
    }

    /// Remove an entry by participant id. Never touches `matches`.
    pub fn remove_player(&mut self, id: &str) -> Result<Participant, TournamentError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| TournamentError::not_found("Participant"))?;
        Ok(self.players.remove(idx))
    }

    /// Replace rules (Setup or InProgress).
    pub fn set_rules(&mut self, rules: TournamentRules) -> Result<(), TournamentError> {
        if self.status == TournamentStatus::Completed {
            return Err(TournamentError::InvalidState);
        }
        self.rules = Some(rules.normalized());
        Ok(())
    }
}
