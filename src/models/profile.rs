//! UserProfile, ProfileStats, and the authenticated Principal.

use crate::models::error::TournamentError;
use crate::models::participant::{AccountId, Player, TeamMember};
use crate::models::tournament::TournamentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum length of a sanitized username.
pub const MIN_USERNAME_LEN: usize = 3;

/// Authenticated identity handed over by the identity provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(account_id: impl Into<AccountId>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: None,
            email: None,
        }
    }
}

/// Counters kept on the profile record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub tournaments_hosted: u32,
    pub tournaments_played: u32,
    pub tournaments_won: u32,
}

impl ProfileStats {
    /// Share of played tournaments won, in percent.
    pub fn win_rate(&self) -> f64 {
        if self.tournaments_played == 0 {
            return 0.0;
        }
        f64::from(self.tournaments_won) / f64::from(self.tournaments_played) * 100.0
    }
}

/// Profile record stored at `users/{uid}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: AccountId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Tournament this account is currently taking part in.
    #[serde(default)]
    pub active_tournament_id: Option<TournamentId>,
    #[serde(default)]
    pub stats: ProfileStats,
}

impl UserProfile {
    /// Fresh profile for `principal` under an already sanitized username.
    pub fn new(principal: &Principal, username: impl Into<String>) -> Self {
        Self {
            uid: principal.account_id.clone(),
            username: username.into(),
            display_name: principal.display_name.clone(),
            email: principal.email.clone(),
            photo_url: None,
            created_at: Utc::now(),
            active_tournament_id: None,
            stats: ProfileStats::default(),
        }
    }

    pub fn as_player(&self) -> Player {
        Player::new(self.uid.clone(), self.username.clone()).with_photo(self.photo_url.clone())
    }

    pub fn as_member(&self) -> TeamMember {
        TeamMember {
            uid: self.uid.clone(),
            username: self.username.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Lowercase and drop everything outside `[a-z0-9_]`; at least 3 characters must survive.
pub fn sanitize_username(raw: &str) -> Result<String, TournamentError> {
    let name: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    if name.len() < MIN_USERNAME_LEN {
        return Err(TournamentError::InvalidUsername);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_and_lowercases() {
        assert_eq!(sanitize_username("Ali-Ce_01!").unwrap(), "alice_01");
        assert_eq!(sanitize_username("a!b"), Err(TournamentError::InvalidUsername));
    }

    #[test]
    fn win_rate_handles_no_games() {
        assert_eq!(ProfileStats::default().win_rate(), 0.0);
        let stats = ProfileStats {
            tournaments_hosted: 0,
            tournaments_played: 4,
            tournaments_won: 1,
        };
        assert_eq!(stats.win_rate(), 25.0);
    }
}
