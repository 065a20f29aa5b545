//! Match advancement: record a winner and move them into the next round.

use crate::models::{Match, MatchId, Participant, Tournament, TournamentError, TournamentStatus};

/// What recording a winner did to the bracket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Advancement {
    /// Winner placed into `slot` of the match at `(round, match_in_round)`.
    Advanced {
        round: u32,
        match_in_round: u32,
        slot: usize,
    },
    /// The final was decided.
    Completed { winner: Participant },
}

/// Declare `winner_id` the winner of `match_id` and return the updated match list.
///
/// The declared winner must occupy one of the match's two slots, both slots must hold real
/// participants, and the match must be undecided. Re-declaring the winner a match already
/// has is accepted and yields the same tree, so a retried report is harmless.
///
/// The final is the match in the bracket's last round, read from the generated topology
/// rather than from the live roster.
pub fn set_winner(
    matches: &[Match],
    match_id: MatchId,
    winner_id: &str,
) -> Result<(Vec<Match>, Advancement), TournamentError> {
    let idx = matches
        .iter()
        .position(|m| m.id == match_id)
        .ok_or_else(|| TournamentError::not_found(format!("Match {match_id}")))?;
    let current = &matches[idx];

    if !current.is_playable() {
        return Err(TournamentError::invalid_winner(
            "both slots must hold real participants",
        ));
    }
    let slot = current
        .slot_of(winner_id)
        .ok_or_else(|| TournamentError::invalid_winner("winner is not playing in this match"))?;
    if let Some(existing) = &current.winner {
        if existing.id() != winner_id {
            return Err(TournamentError::invalid_winner("match already has a winner"));
        }
    }
    let winner = current.players[slot]
        .clone()
        .ok_or_else(|| TournamentError::invalid_winner("empty slot"))?;

    let total_rounds = matches.iter().map(|m| m.round).max().unwrap_or(0);
    let mut next = matches.to_vec();
    next[idx].winner = Some(winner.clone());

    if next[idx].round == total_rounds {
        return Ok((next, Advancement::Completed { winner }));
    }
    let advancement = place_in_next_round(&mut next, idx, winner)?;
    Ok((next, advancement))
}

/// Put `winner` of `matches[from]` into its slot in the following round.
pub(crate) fn place_in_next_round(
    matches: &mut [Match],
    from: usize,
    winner: Participant,
) -> Result<Advancement, TournamentError> {
    let (round, match_in_round, slot) = matches[from].next_position();
    let target = matches
        .iter_mut()
        .find(|m| m.round == round && m.match_in_round == match_in_round)
        .ok_or_else(|| TournamentError::not_found(format!("Round {round} match {match_in_round}")))?;
    target.players[slot] = Some(winner);
    Ok(Advancement::Advanced {
        round,
        match_in_round,
        slot,
    })
}

/// Apply a reported result to the tournament (InProgress only). Deciding the final records the
/// tournament winner and completes the tournament.
pub fn record_result(
    tournament: &mut Tournament,
    match_id: MatchId,
    winner_id: &str,
) -> Result<Advancement, TournamentError> {
    if tournament.status != TournamentStatus::InProgress {
        return Err(TournamentError::InvalidState);
    }
    let (matches, advancement) = set_winner(&tournament.matches, match_id, winner_id)?;
    tournament.matches = matches;
    if let Advancement::Completed { winner } = &advancement {
        tournament.tournament_winner = Some(winner.clone());
        tournament.status = TournamentStatus::Completed;
    }
    Ok(advancement)
}
