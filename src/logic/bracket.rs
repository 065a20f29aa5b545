//! Bracket generation: participant set -> full single-elimination match tree.

use crate::logic::advance::place_in_next_round;
use crate::models::{Match, MatchId, Participant, TournamentError};
use rand::seq::SliceRandom;
use rand::Rng;

/// Build every match of a single-elimination bracket for `participants`.
///
/// 1. Shuffle the entries with `rng` (seed it for reproducible brackets).
/// 2. Round the field up to `bracket_size`, the next power of two.
/// 3. The first `bracket_size / 2` entries take the leading slot of each round-1 pairing;
///    entry `i` beyond that lands in slot `(i - bracket_size / 2) * 2 + 1`, opposite entry
///    `i - bracket_size / 2`. Pairings left without a partner get a `BYE` and are decided
///    on the spot.
/// 4. Append empty placeholder matches for every later round, halving down to the final.
/// 5. Move every bye winner into its round-2 slot.
///
/// Ids run from 0 in generation order: round 1 left to right, then round 2, and so on.
pub fn generate_bracket<R: Rng + ?Sized>(
    participants: &[Participant],
    rng: &mut R,
) -> Result<Vec<Match>, TournamentError> {
    if participants.len() < 2 {
        return Err(TournamentError::InsufficientParticipants);
    }

    let mut shuffled = participants.to_vec();
    shuffled.shuffle(rng);

    let bracket_size = shuffled.len().next_power_of_two();
    let half = bracket_size / 2;

    let mut slots: Vec<Option<Participant>> = vec![None; bracket_size];
    for (i, p) in shuffled.into_iter().enumerate() {
        let slot = if i < half { i * 2 } else { (i - half) * 2 + 1 };
        slots[slot] = Some(p);
    }

    let mut matches: Vec<Match> = Vec::with_capacity(bracket_size - 1);
    let mut next_id: MatchId = 0;

    for (i, pair) in slots.chunks_exact(2).enumerate() {
        // Leading slots are always filled: the field is more than half the bracket.
        let p1 = pair[0].clone().ok_or(TournamentError::InsufficientParticipants)?;
        let p2 = pair[1].clone().unwrap_or_else(Participant::bye);
        let winner = p2.is_bye().then(|| p1.clone());
        matches.push(Match {
            id: next_id,
            round: 1,
            match_in_round: i as u32,
            players: [Some(p1), Some(p2)],
            winner,
        });
        next_id += 1;
    }

    let mut round = 1;
    let mut matches_in_round = half;
    while matches_in_round > 1 {
        matches_in_round /= 2;
        round += 1;
        for i in 0..matches_in_round {
            matches.push(Match::placeholder(next_id, round, i as u32));
            next_id += 1;
        }
    }

    let byes: Vec<(usize, Participant)> = matches
        .iter()
        .enumerate()
        .filter(|(_, m)| m.round == 1)
        .filter_map(|(idx, m)| m.winner.clone().map(|w| (idx, w)))
        .collect();
    for (idx, winner) in byes {
        place_in_next_round(&mut matches, idx, winner)?;
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Player;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Player::new(format!("u{i}"), format!("P{i}")).into())
            .collect()
    }

    #[test]
    fn three_entries_get_one_bye() {
        let matches = generate_bracket(&field(3), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(matches.len(), 3);
        let byes: Vec<_> = matches.iter().filter(|m| m.has_bye()).collect();
        assert_eq!(byes.len(), 1);
        assert_eq!(byes[0].match_in_round, 1);
        let final_match = &matches[2];
        assert_eq!(final_match.players[1], byes[0].winner);
        assert!(final_match.players[0].is_none());
    }

    #[test]
    fn ids_follow_generation_order() {
        let matches = generate_bracket(&field(6), &mut StdRng::seed_from_u64(1)).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
        assert!(matches.windows(2).all(|w| w[0].round <= w[1].round));
    }
}
