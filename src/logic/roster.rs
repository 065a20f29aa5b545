//! Team roster rules and join-entry construction.

use crate::models::{
    Participant, Team, TeamMember, Tournament, TournamentError, UserProfile, TEAM_COLORS,
};

/// What leaving a team did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LeaveOutcome {
    /// The captain left: the whole team is gone.
    Disbanded,
    /// A member left; the team continues.
    Left(TeamMember),
}

/// Bracket entry created for `profile` joining `tournament`: the account itself, or, in team
/// mode, a new team with the joiner as captain and sole member.
pub fn entry_for(tournament: &Tournament, profile: &UserProfile) -> Participant {
    if tournament.kind.is_team_mode() {
        let color = TEAM_COLORS[tournament.players.len() % TEAM_COLORS.len()];
        Team::founded_by(profile.as_member(), tournament.id, color).into()
    } else {
        profile.as_player().into()
    }
}

/// Captain adds `invitee` to the team (at most 4 members, no duplicates).
pub fn invite_member(team: &mut Team, actor: &str, invitee: TeamMember) -> Result<(), TournamentError> {
    if !team.is_captain(actor) {
        return Err(TournamentError::Unauthorized);
    }
    if team.has_member(&invitee.uid) {
        return Err(TournamentError::AlreadyMember);
    }
    if team.is_full() {
        return Err(TournamentError::TeamFull);
    }
    team.members.push(invitee);
    Ok(())
}

/// Captain removes a non-captain member.
pub fn remove_member(team: &mut Team, actor: &str, uid: &str) -> Result<TeamMember, TournamentError> {
    if !team.is_captain(actor) {
        return Err(TournamentError::Unauthorized);
    }
    if team.is_captain(uid) {
        // The captain leaves through disband.
        return Err(TournamentError::InvalidState);
    }
    let idx = team
        .members
        .iter()
        .position(|m| m.uid == uid)
        .ok_or_else(|| TournamentError::not_found("Team member"))?;
    Ok(team.members.remove(idx))
}

/// `uid` leaves the team; the captain leaving disbands it.
pub fn leave_team(team: &mut Team, uid: &str) -> Result<LeaveOutcome, TournamentError> {
    if team.is_captain(uid) {
        team.members.clear();
        return Ok(LeaveOutcome::Disbanded);
    }
    let idx = team
        .members
        .iter()
        .position(|m| m.uid == uid)
        .ok_or(TournamentError::NotRegistered)?;
    Ok(LeaveOutcome::Left(team.members.remove(idx)))
}

/// Drop candidates already on the team.
pub fn invite_candidates(candidates: Vec<UserProfile>, team: &Team) -> Vec<UserProfile> {
    candidates
        .into_iter()
        .filter(|p| !team.has_member(&p.uid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn team() -> Team {
        Team::founded_by(TeamMember::new("cap", "cap"), Uuid::new_v4(), TEAM_COLORS[0])
    }

    #[test]
    fn only_captain_invites() {
        let mut t = team();
        assert_eq!(
            invite_member(&mut t, "m1", TeamMember::new("m2", "m2")),
            Err(TournamentError::Unauthorized)
        );
    }

    #[test]
    fn captain_cannot_be_removed() {
        let mut t = team();
        assert_eq!(remove_member(&mut t, "cap", "cap"), Err(TournamentError::InvalidState));
        assert!(t.is_well_formed());
    }

    #[test]
    fn member_leaving_keeps_team() {
        let mut t = team();
        invite_member(&mut t, "cap", TeamMember::new("m1", "m1")).unwrap();
        assert!(matches!(leave_team(&mut t, "m1"), Ok(LeaveOutcome::Left(_))));
        assert_eq!(t.members.len(), 1);
        assert_eq!(leave_team(&mut t, "cap"), Ok(LeaveOutcome::Disbanded));
    }
}
