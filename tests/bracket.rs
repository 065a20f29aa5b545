//! Integration tests for the bracket: generation shape, byes, advancement, and completion.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tournament_bracket::{
    generate_bracket, record_result, set_winner, start_tournament, Advancement, Match,
    Participant, Player, Tournament, TournamentError, TournamentKind, TournamentStatus, BYE_ID,
};

fn field(names: &[&str]) -> Vec<Participant> {
    names
        .iter()
        .map(|n| Player::new(n.to_lowercase(), *n).into())
        .collect()
}

fn started(names: &[&str], seed: u64) -> Tournament {
    let mut t = Tournament::with_players("Cup", TournamentKind::Duel, "org", field(names));
    start_tournament(&mut t, &mut StdRng::seed_from_u64(seed)).unwrap();
    t
}

/// Report slot 0 as winner of every playable match, in id order, until the final is decided.
fn play_out(t: &mut Tournament) -> Participant {
    loop {
        let next = t
            .matches
            .iter()
            .find(|m| m.is_playable() && !m.is_decided())
            .map(|m| (m.id, m.players[0].as_ref().unwrap().id().to_string()));
        match next {
            Some((id, winner)) => {
                record_result(t, id, &winner).unwrap();
            }
            None => break,
        }
    }
    t.tournament_winner.clone().unwrap()
}

fn round(matches: &[Match], r: u32) -> Vec<&Match> {
    matches.iter().filter(|m| m.round == r).collect()
}

#[test]
fn five_entries_make_an_eight_slot_bracket() {
    let t = started(&["A", "B", "C", "D", "E"], 3);
    assert_eq!(t.matches.len(), 7);
    assert_eq!(t.total_rounds(), 3);
    assert_eq!(t.bracket_size(), 8);
    assert_eq!(round(&t.matches, 1).len(), 4);
    assert_eq!(round(&t.matches, 2).len(), 2);
    assert_eq!(round(&t.matches, 3).len(), 1);

    let byes: Vec<_> = t.matches.iter().filter(|m| m.has_bye()).collect();
    assert_eq!(byes.len(), 3);
    for bye in byes {
        assert_eq!(bye.round, 1);
        let winner = bye.winner.as_ref().expect("bye pairing is pre-decided");
        assert_ne!(winner.id(), BYE_ID);
        let (r, mir, slot) = bye.next_position();
        let next = t
            .matches
            .iter()
            .find(|m| m.round == r && m.match_in_round == mir)
            .unwrap();
        assert_eq!(next.players[slot].as_ref(), Some(winner));
    }
}

#[test]
fn every_entry_appears_exactly_once_in_round_one() {
    for n in 2usize..=17 {
        let names: Vec<String> = (0..n).map(|i| format!("P{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let entries = field(&refs);
        let matches = generate_bracket(&entries, &mut StdRng::seed_from_u64(n as u64)).unwrap();

        let size = n.next_power_of_two();
        assert_eq!(matches.len(), size - 1, "n = {n}");
        let mut seen: Vec<&str> = round(&matches, 1)
            .iter()
            .flat_map(|m| m.players.iter().flatten())
            .filter(|p| !p.is_bye())
            .map(|p| p.id())
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = entries.iter().map(|p| p.id()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected, "n = {n}");

        // Never two byes in one pairing.
        assert!(round(&matches, 1)
            .iter()
            .all(|m| m.players.iter().flatten().filter(|p| p.is_bye()).count() <= 1));
    }
}

#[test]
fn four_entries_play_to_completion() {
    let mut t = started(&["A", "B", "C", "D"], 11);
    assert_eq!(t.matches.len(), 3);
    assert_eq!(t.total_rounds(), 2);
    assert!(t.matches.iter().all(|m| !m.has_bye()));

    let a = t.matches[0].players[0].clone().unwrap();
    let c = t.matches[1].players[0].clone().unwrap();
    record_result(&mut t, 0, a.id()).unwrap();
    record_result(&mut t, 1, c.id()).unwrap();
    assert_eq!(t.matches[2].players, [Some(a.clone()), Some(c)]);
    assert_eq!(t.status, TournamentStatus::InProgress);

    let outcome = record_result(&mut t, 2, a.id()).unwrap();
    assert_eq!(outcome, Advancement::Completed { winner: a.clone() });
    assert_eq!(t.tournament_winner, Some(a));
    assert_eq!(t.status, TournamentStatus::Completed);
}

#[test]
fn two_entries_finish_in_one_report() {
    let mut t = started(&["A", "B"], 0);
    assert_eq!(t.matches.len(), 1);
    assert_eq!(t.total_rounds(), 1);
    let b = t.matches[0].players[1].clone().unwrap();
    record_result(&mut t, 0, b.id()).unwrap();
    assert_eq!(t.status, TournamentStatus::Completed);
    assert_eq!(t.tournament_winner, Some(b));
}

#[test]
fn open_slot_rejects_a_winner_and_leaves_matches_alone() {
    let t = started(&["A", "B", "C", "D"], 5);
    let before = t.matches.clone();
    let someone = before[0].players[0].clone().unwrap();
    let err = set_winner(&before, 2, someone.id()).unwrap_err();
    assert!(matches!(err, TournamentError::InvalidWinnerDeclaration(_)));
    assert_eq!(t.matches, before);
}

#[test]
fn outsider_cannot_win_a_match() {
    let t = started(&["A", "B", "C", "D"], 5);
    assert!(matches!(
        set_winner(&t.matches, 0, "nobody"),
        Err(TournamentError::InvalidWinnerDeclaration(_))
    ));
}

#[test]
fn same_winner_twice_is_idempotent() {
    let t = started(&["A", "B", "C", "D"], 9);
    let winner = t.matches[0].players[1].clone().unwrap();
    let (once, _) = set_winner(&t.matches, 0, winner.id()).unwrap();
    let (twice, _) = set_winner(&once, 0, winner.id()).unwrap();
    assert_eq!(once, twice);

    let loser = t.matches[0].players[0].clone().unwrap();
    assert!(matches!(
        set_winner(&once, 0, loser.id()),
        Err(TournamentError::InvalidWinnerDeclaration(_))
    ));
}

#[test]
fn odd_field_always_produces_a_champion() {
    for seed in 0..20 {
        let mut t = started(&["A", "B", "C", "D", "E", "F", "G"], seed);
        let champion = play_out(&mut t);
        assert_eq!(t.status, TournamentStatus::Completed);
        assert!(t.get_player(champion.id()).is_some());
        let final_match = t.matches.iter().max_by_key(|m| m.round).unwrap();
        assert_eq!(final_match.winner.as_ref(), Some(&champion));
    }
}

#[test]
fn results_rejected_outside_in_progress() {
    let mut t = Tournament::with_players("Cup", TournamentKind::Duel, "org", field(&["A", "B"]));
    assert_eq!(record_result(&mut t, 0, "a"), Err(TournamentError::InvalidState));

    let mut done = started(&["A", "B"], 1);
    play_out(&mut done);
    assert_eq!(
        record_result(&mut done, 0, "a"),
        Err(TournamentError::InvalidState)
    );
}

#[test]
fn start_needs_two_entries() {
    let mut t = Tournament::with_players("Cup", TournamentKind::Duel, "org", field(&["A"]));
    assert_eq!(
        start_tournament(&mut t, &mut StdRng::seed_from_u64(0)),
        Err(TournamentError::InsufficientParticipants)
    );
    assert_eq!(t.status, TournamentStatus::Setup);
    assert!(t.matches.is_empty());
}

#[test]
fn removing_an_entry_keeps_the_bracket() {
    let mut t = started(&["A", "B", "C"], 2);
    let before = t.matches.clone();
    t.remove_player("a").unwrap();
    assert_eq!(t.matches, before);
    assert_eq!(t.total_rounds(), 2);
}

#[test]
fn same_seed_same_bracket() {
    let entries = field(&["A", "B", "C", "D", "E", "F"]);
    let one = generate_bracket(&entries, &mut StdRng::seed_from_u64(42)).unwrap();
    let two = generate_bracket(&entries, &mut StdRng::seed_from_u64(42)).unwrap();
    assert_eq!(one, two);
}
