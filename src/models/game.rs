//! Bracket match.

use crate::models::participant::Participant;
use serde::{Deserialize, Serialize};

/// Identifier of a match, unique within one tournament and assigned in generation order.
pub type MatchId = u32;

/// A single bracket match between two slots.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// 1-based round number; the highest round is the final.
    pub round: u32,
    /// 0-based position within the round.
    pub match_in_round: u32,
    /// `None` = not yet determined.
    pub players: [Option<Participant>; 2],
    /// None if not yet played.
    pub winner: Option<Participant>,
}

impl Match {
    /// Empty placeholder for a later round.
    pub fn placeholder(id: MatchId, round: u32, match_in_round: u32) -> Self {
        Self {
            id,
            round,
            match_in_round,
            players: [None, None],
            winner: None,
        }
    }

    /// Both slots hold real (non-bye) participants.
    pub fn is_playable(&self) -> bool {
        self.players
            .iter()
            .all(|slot| matches!(slot, Some(p) if !p.is_bye()))
    }

    pub fn has_bye(&self) -> bool {
        self.players.iter().flatten().any(Participant::is_bye)
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }

    /// Slot holding the participant with `id`, if any.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|p| p.id() == id))
    }

    /// Where the winner of this match goes: `(round, match_in_round, slot)` of the next round.
    pub fn next_position(&self) -> (u32, u32, usize) {
        (
            self.round + 1,
            self.match_in_round / 2,
            (self.match_in_round % 2) as usize,
        )
    }
}
