//! Participant, Player, Team, and TeamMember data structures.

use crate::models::tournament::TournamentId;
use serde::{Deserialize, Serialize};

/// Stable account identifier supplied by the identity provider.
pub type AccountId = String;

/// Id literal of the reserved bye participant.
pub const BYE_ID: &str = "BYE";

/// Maximum number of members on one team.
pub const MAX_TEAM_SIZE: usize = 4;

/// Display tags handed out to teams in join order.
pub const TEAM_COLORS: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
];

/// An individual competitor (or the `BYE` placeholder).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Player {
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            photo_url: None,
        }
    }

    pub fn with_photo(mut self, photo_url: Option<String>) -> Self {
        self.photo_url = photo_url;
        self
    }
}

/// One account on a team roster.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub uid: AccountId,
    pub username: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl TeamMember {
    pub fn new(uid: impl Into<AccountId>, username: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            photo_url: None,
        }
    }
}

/// A team competing as one bracket entry. The id is the captain's account id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: AccountId,
    pub name: String,
    pub captain_id: AccountId,
    /// Ordered roster; the captain is always present. Between 1 and 4 entries.
    pub members: Vec<TeamMember>,
    pub color: String,
    pub tournament_id: TournamentId,
}

impl Team {
    /// New team with `captain` as its only member.
    pub fn founded_by(captain: TeamMember, tournament_id: TournamentId, color: impl Into<String>) -> Self {
        Self {
            id: captain.uid.clone(),
            name: format!("{}'s Team", captain.username),
            captain_id: captain.uid.clone(),
            members: vec![captain],
            color: color.into(),
            tournament_id,
        }
    }

    pub fn is_captain(&self, uid: &str) -> bool {
        self.captain_id == uid
    }

    pub fn has_member(&self, uid: &str) -> bool {
        self.members.iter().any(|m| m.uid == uid)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_TEAM_SIZE
    }

    /// Size within `[1, 4]` and captain on the roster.
    pub fn is_well_formed(&self) -> bool {
        (1..=MAX_TEAM_SIZE).contains(&self.members.len()) && self.has_member(&self.captain_id)
    }
}

/// One bracket entry: an individual or a team.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Participant {
    Individual(Player),
    Team(Team),
}

impl Participant {
    /// The placeholder filling an empty round-1 slot.
    pub fn bye() -> Self {
        Participant::Individual(Player::new(BYE_ID, BYE_ID))
    }

    pub fn id(&self) -> &str {
        match self {
            Participant::Individual(p) => &p.id,
            Participant::Team(t) => &t.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Participant::Individual(p) => &p.name,
            Participant::Team(t) => &t.name,
        }
    }

    pub fn photo_url(&self) -> Option<&str> {
        match self {
            Participant::Individual(p) => p.photo_url.as_deref(),
            Participant::Team(_) => None,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.id() == BYE_ID
    }

    /// Account ids this entry stands for. A bye stands for nobody.
    pub fn member_ids(&self) -> Vec<AccountId> {
        match self {
            Participant::Individual(p) if p.id == BYE_ID => Vec::new(),
            Participant::Individual(p) => vec![p.id.clone()],
            Participant::Team(t) => t.members.iter().map(|m| m.uid.clone()).collect(),
        }
    }

    /// Whether `uid` is this individual or on this team.
    pub fn includes(&self, uid: &str) -> bool {
        match self {
            Participant::Individual(p) => p.id == uid,
            Participant::Team(t) => t.has_member(uid),
        }
    }

    pub fn as_team(&self) -> Option<&Team> {
        match self {
            Participant::Team(t) => Some(t),
            Participant::Individual(_) => None,
        }
    }
}

impl From<Player> for Participant {
    fn from(p: Player) -> Self {
        Participant::Individual(p)
    }
}

impl From<Team> for Participant {
    fn from(t: Team) -> Self {
        Participant::Team(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn bye_stands_for_nobody() {
        let bye = Participant::bye();
        assert!(bye.is_bye());
        assert!(bye.member_ids().is_empty());
    }

    #[test]
    fn team_flattens_to_members() {
        let mut team = Team::founded_by(TeamMember::new("cap", "cap"), Uuid::new_v4(), TEAM_COLORS[0]);
        team.members.push(TeamMember::new("m1", "m1"));
        let p = Participant::from(team);
        assert_eq!(p.id(), "cap");
        assert_eq!(p.member_ids(), vec!["cap".to_string(), "m1".to_string()]);
        assert!(p.includes("m1"));
        assert_eq!(p.name(), "cap's Team");
    }

    #[test]
    fn participant_is_tagged_on_the_wire() {
        let p = Participant::from(Player::new("u1", "alice"));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "individual");
        assert_eq!(json["id"], "u1");
    }
}
