//! Authorization checks run before any tournament mutation.

use crate::models::{Match, Tournament, TournamentError, TournamentStatus};
use std::fmt;

/// Actions reserved for the tournament's organizer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrganizerAction {
    Start,
    Delete,
    Kick,
    DeclareWinner,
    GenerateInvite,
    EditRules,
}

impl fmt::Display for OrganizerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrganizerAction::Start => "start",
            OrganizerAction::Delete => "delete",
            OrganizerAction::Kick => "kick",
            OrganizerAction::DeclareWinner => "declare winner",
            OrganizerAction::GenerateInvite => "generate invite",
            OrganizerAction::EditRules => "edit rules",
        };
        f.write_str(name)
    }
}

/// Only the organizer may perform `action`.
pub fn ensure_organizer(
    tournament: &Tournament,
    uid: &str,
    action: OrganizerAction,
) -> Result<(), TournamentError> {
    if tournament.is_organizer(uid) {
        Ok(())
    } else {
        log::warn!(
            "{} refused: {} is not the organizer of {}",
            action,
            uid,
            tournament.id
        );
        Err(TournamentError::Unauthorized)
    }
}

/// Anyone not yet on the roster may join while the tournament is in Setup.
pub fn ensure_can_join(tournament: &Tournament, uid: &str) -> Result<(), TournamentError> {
    if tournament.status != TournamentStatus::Setup {
        return Err(TournamentError::InvalidState);
    }
    if tournament.is_registered(uid) {
        return Err(TournamentError::AlreadyRegistered);
    }
    Ok(())
}

/// Members may leave while the tournament is in Setup. Organizers leave like anyone else.
pub fn ensure_can_leave(tournament: &Tournament, uid: &str) -> Result<(), TournamentError> {
    if tournament.status != TournamentStatus::Setup {
        return Err(TournamentError::InvalidState);
    }
    if !tournament.is_registered(uid) {
        return Err(TournamentError::NotRegistered);
    }
    Ok(())
}

/// A winner may be declared only on an undecided match between two real participants.
pub fn ensure_declarable(m: &Match) -> Result<(), TournamentError> {
    if m.has_bye() {
        return Err(TournamentError::invalid_winner("bye matches are decided automatically"));
    }
    if !m.is_playable() {
        return Err(TournamentError::invalid_winner("both slots must be filled"));
    }
    if m.is_decided() {
        return Err(TournamentError::invalid_winner("match already has a winner"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Participant, Player, TournamentKind};

    #[test]
    fn organizer_passes_others_do_not() {
        let t = Tournament::new("Cup", TournamentKind::Duel, "org", "org");
        assert!(ensure_organizer(&t, "org", OrganizerAction::Start).is_ok());
        assert_eq!(
            ensure_organizer(&t, "someone", OrganizerAction::Kick),
            Err(TournamentError::Unauthorized)
        );
    }

    #[test]
    fn bye_match_is_not_declarable() {
        let m = Match {
            id: 0,
            round: 1,
            match_in_round: 0,
            players: [Some(Player::new("a", "A").into()), Some(Participant::bye())],
            winner: Some(Player::new("a", "A").into()),
        };
        assert!(matches!(
            ensure_declarable(&m),
            Err(TournamentError::InvalidWinnerDeclaration(_))
        ));
    }
}
