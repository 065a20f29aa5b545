//! Named tournament transactions over a [`DocumentStore`].
//!
//! Each public operation validates against freshly read documents, then commits one
//! [`Batch`] holding every document mutation it needs. Roster lists are only touched through
//! keyed array deltas so concurrent joins and leaves never overwrite each other; whole-record
//! writes (start, result reports, team changes) carry a version precondition and fail with
//! `StaleWrite` if someone else wrote first.

use crate::logic::{
    self, ensure_can_join, ensure_can_leave, ensure_declarable, ensure_organizer, Advancement,
    LeaveOutcome, OrganizerAction,
};
use crate::models::{
    sanitize_username, AccountId, MatchId, Participant, Principal, Team, Tournament,
    TournamentError, TournamentId, TournamentKind, TournamentRules, TournamentStatus, UserProfile,
};
use crate::store::{
    teams_collection, Batch, BlobStore, DocKey, DocumentStore, FieldOp, Filter, Precondition,
    Subscription, Versioned, TOURNAMENTS, USERS,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Mutex;
use uuid::Uuid;

const ACTIVE_TOURNAMENT: &str = "active_tournament_id";
const INVITE_TOKEN_LEN: usize = 10;

/// Tournament operations bound to one store client.
pub struct TournamentService<S> {
    store: S,
    rng: Mutex<StdRng>,
}

impl<S: DocumentStore> TournamentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Service whose bracket shuffles are reproducible.
    pub fn with_seed(store: S, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- profiles -------------------------------------------------------------------------

    /// CreateProfile: reserve a sanitized, unique username and create the profile record.
    pub async fn create_profile(
        &self,
        principal: &Principal,
        username: &str,
    ) -> Result<UserProfile, TournamentError> {
        let username = sanitize_username(username)?;
        let name_key = DocKey::username(&username);
        if self.store.get(&name_key).await?.is_some() {
            return Err(TournamentError::UsernameTaken);
        }
        let user_key = DocKey::user(&principal.account_id);
        if self.store.get(&user_key).await?.is_some() {
            return Err(TournamentError::AlreadyRegistered);
        }

        let profile = UserProfile::new(principal, username.clone());
        let batch = Batch::new("CreateProfile")
            .require(name_key.clone(), Precondition::Missing)
            .require(user_key.clone(), Precondition::Missing)
            .set(user_key, &profile)?
            .set(name_key, serde_json::json!({ "uid": principal.account_id }))?;
        match self.store.commit(batch).await {
            Err(TournamentError::StaleWrite) => return Err(TournamentError::UsernameTaken),
            other => other?,
        }
        info!("created profile {} for {}", username, principal.account_id);
        Ok(profile)
    }

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, TournamentError> {
        match self.store.get(&DocKey::user(uid)).await? {
            Some(snapshot) => Ok(Some(snapshot.decode::<UserProfile>()?.value)),
            None => Ok(None),
        }
    }

    async fn require_profile(&self, uid: &str) -> Result<UserProfile, TournamentError> {
        Ok(self.versioned_profile(uid).await?.value)
    }

    /// Profile with the version it was read at. Batches that register `uid` somewhere require
    /// this version, so two registrations of the same account cannot both commit.
    async fn versioned_profile(&self, uid: &str) -> Result<Versioned<UserProfile>, TournamentError> {
        self.store
            .get(&DocKey::user(uid))
            .await?
            .ok_or_else(|| TournamentError::not_found("Profile"))?
            .decode()
    }

    /// Upload a new profile picture and point the profile at it.
    pub async fn set_profile_photo<B: BlobStore>(
        &self,
        principal: &Principal,
        blobs: &B,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, TournamentError> {
        self.require_profile(&principal.account_id).await?;
        let url = blobs.put(bytes, content_type).await?;
        self.store
            .update(
                DocKey::user(&principal.account_id),
                vec![FieldOp::set("photo_url", &url)?],
            )
            .await?;
        Ok(url)
    }

    /// Profiles whose username starts with `prefix` (case-insensitive).
    pub async fn search_users(&self, prefix: &str) -> Result<Vec<UserProfile>, TournamentError> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .query(USERS, &[Filter::prefix("username", prefix)])
            .await?
            .iter()
            .map(|s| s.decode::<UserProfile>().map(|v| v.value))
            .collect()
    }

    /// Keys of the profiles that exist among `uids`.
    async fn existing_profiles(&self, uids: &[AccountId]) -> Result<Vec<DocKey>, TournamentError> {
        let mut keys = Vec::with_capacity(uids.len());
        for uid in uids {
            let key = DocKey::user(uid);
            if self.store.get(&key).await?.is_some() {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Clear the active pointer of every existing profile in `uids` still pointing at `id`.
    async fn clear_pointers(
        &self,
        mut batch: Batch,
        uids: &[AccountId],
        id: TournamentId,
    ) -> Result<Batch, TournamentError> {
        for key in self.existing_profiles(uids).await? {
            batch = batch.update(key, vec![FieldOp::clear_if_equals(ACTIVE_TOURNAMENT, id.to_string())]);
        }
        Ok(batch)
    }

    // ---- tournaments ----------------------------------------------------------------------

    /// CreateTournament: new Setup tournament; the organizer optionally enters it right away.
    pub async fn create_tournament(
        &self,
        principal: &Principal,
        name: &str,
        kind: TournamentKind,
        participate: bool,
    ) -> Result<Tournament, TournamentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TournamentError::InvalidState);
        }
        let organizer = self.require_profile(&principal.account_id).await?;
        let mut tournament = Tournament::new(name, kind, organizer.uid.clone(), organizer.username.clone());
        tournament.organizer_photo_url = organizer.photo_url.clone();

        let mut batch = Batch::new("CreateTournament");
        if participate {
            let entry = logic::entry_for(&tournament, &organizer);
            if let Participant::Team(team) = &entry {
                batch = batch.set(DocKey::team(tournament.id, &team.id), team)?;
            }
            tournament.add_player(entry)?;
            batch = batch.update(
                DocKey::user(&organizer.uid),
                vec![FieldOp::set(ACTIVE_TOURNAMENT, tournament.id)?],
            );
        }
        let batch = batch
            .require(DocKey::tournament(tournament.id), Precondition::Missing)
            .set(DocKey::tournament(tournament.id), &tournament)?;
        self.store.commit(batch).await?;
        info!("{} created tournament {} ({})", organizer.username, tournament.name, tournament.id);
        Ok(tournament)
    }

    pub async fn get_tournament(&self, id: TournamentId) -> Result<Versioned<Tournament>, TournamentError> {
        self.store
            .get(&DocKey::tournament(id))
            .await?
            .ok_or_else(|| TournamentError::not_found("Tournament"))?
            .decode()
    }

    /// Tournaments still accepting entries.
    pub async fn list_open_tournaments(&self) -> Result<Vec<Tournament>, TournamentError> {
        self.store
            .query(TOURNAMENTS, &[Filter::eq("status", TournamentStatus::Setup)?])
            .await?
            .iter()
            .map(|s| s.decode::<Tournament>().map(|v| v.value))
            .collect()
    }

    /// Live view of the tournament record.
    pub async fn subscribe_tournament(&self, id: TournamentId) -> Result<Subscription, TournamentError> {
        self.store.subscribe(&DocKey::tournament(id)).await
    }

    /// JoinTournament: add the caller's entry (a new team in team mode) and stamp their pointer.
    pub async fn join_tournament(
        &self,
        principal: &Principal,
        id: TournamentId,
    ) -> Result<Participant, TournamentError> {
        // Profile first: any registration committed after this read bumps its version.
        let Versioned { version: profile_version, value: profile } =
            self.versioned_profile(&principal.account_id).await?;
        let tournament = self.get_tournament(id).await?.value;
        ensure_can_join(&tournament, &principal.account_id)?;
        let entry = logic::entry_for(&tournament, &profile);

        let key = DocKey::tournament(id);
        let user_key = DocKey::user(&profile.uid);
        let mut batch = Batch::new("JoinTournament")
            .require(key.clone(), Precondition::field_equals("status", TournamentStatus::Setup)?)
            .require(user_key.clone(), Precondition::Version(profile_version))
            .update(key, vec![FieldOp::array_union("players", "id", &entry)?])
            .update(user_key, vec![FieldOp::set(ACTIVE_TOURNAMENT, id)?]);
        if let Participant::Team(team) = &entry {
            let team_key = DocKey::team(id, &team.id);
            batch = batch.require(team_key.clone(), Precondition::Missing).set(team_key, team)?;
        }
        self.store.commit(batch).await?;
        info!("{} joined tournament {}", profile.username, id);
        Ok(entry)
    }

    /// Resolve an invite token to the open tournament carrying it.
    pub async fn resolve_invite(&self, token: &str) -> Result<Tournament, TournamentError> {
        let filters = [
            Filter::eq("invite_token", token)?,
            Filter::eq("status", TournamentStatus::Setup)?,
        ];
        self.store
            .query(TOURNAMENTS, &filters)
            .await?
            .first()
            .ok_or_else(|| TournamentError::not_found("Invite"))?
            .decode::<Tournament>()
            .map(|v| v.value)
    }

    /// Consume an invite token: same path as a direct join.
    pub async fn join_by_invite(
        &self,
        principal: &Principal,
        token: &str,
    ) -> Result<Participant, TournamentError> {
        let tournament = self.resolve_invite(token).await?;
        self.join_tournament(principal, tournament.id).await
    }

    /// Organizer issues a fresh invite token.
    pub async fn generate_invite(
        &self,
        principal: &Principal,
        id: TournamentId,
    ) -> Result<String, TournamentError> {
        let tournament = self.get_tournament(id).await?.value;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::GenerateInvite)?;
        let token: String = Uuid::new_v4().simple().to_string().chars().take(INVITE_TOKEN_LEN).collect();
        self.store
            .update(DocKey::tournament(id), vec![FieldOp::set("invite_token", &token)?])
            .await?;
        debug!("new invite token for {}", id);
        Ok(token)
    }

    /// Organizer replaces the tournament's rules.
    pub async fn update_rules(
        &self,
        principal: &Principal,
        id: TournamentId,
        rules: TournamentRules,
    ) -> Result<TournamentRules, TournamentError> {
        let mut tournament = self.get_tournament(id).await?.value;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::EditRules)?;
        tournament.set_rules(rules)?;
        let rules = tournament.rules.unwrap_or_default();
        self.store
            .update(DocKey::tournament(id), vec![FieldOp::set("rules", &rules)?])
            .await?;
        Ok(rules)
    }

    /// LeaveTournament: drop the caller's entry and clear their pointer. In team mode this is
    /// leaving (or, for a captain, disbanding) their team.
    pub async fn leave_tournament(
        &self,
        principal: &Principal,
        id: TournamentId,
    ) -> Result<(), TournamentError> {
        let tournament = self.get_tournament(id).await?.value;
        ensure_can_leave(&tournament, &principal.account_id)?;
        if tournament.kind.is_team_mode() {
            return self.leave_team(principal, id).await.map(|_| ());
        }
        let uid = principal.account_id.as_str();
        let key = DocKey::tournament(id);
        let batch = Batch::new("LeaveTournament")
            .require(key.clone(), Precondition::field_equals("status", TournamentStatus::Setup)?)
            .update(key, vec![FieldOp::array_remove("players", "id", uid)]);
        let batch = self.clear_pointers(batch, &[uid.to_string()], id).await?;
        self.store.commit(batch).await?;
        info!("{} left tournament {}", uid, id);
        Ok(())
    }

    /// KickParticipant: organizer removes an entry. Allowed in Setup and, as a disqualification,
    /// in InProgress; the bracket itself is never touched.
    pub async fn kick_participant(
        &self,
        principal: &Principal,
        id: TournamentId,
        participant_id: &str,
    ) -> Result<Participant, TournamentError> {
        let Versioned { version, value: tournament } = self.get_tournament(id).await?;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::Kick)?;
        if tournament.status == TournamentStatus::Completed {
            return Err(TournamentError::InvalidState);
        }
        let entry = tournament
            .get_player(participant_id)
            .cloned()
            .ok_or_else(|| TournamentError::not_found("Participant"))?;

        let mut batch = Batch::new("KickParticipant")
            .require(DocKey::tournament(id), Precondition::Version(version))
            .update(
                DocKey::tournament(id),
                vec![FieldOp::array_remove("players", "id", participant_id)],
            );
        if entry.as_team().is_some() {
            batch = batch.delete(DocKey::team(id, participant_id));
        }
        let batch = self.clear_pointers(batch, &entry.member_ids(), id).await?;
        self.store.commit(batch).await?;
        info!("kicked {} from tournament {}", entry.name(), id);
        Ok(entry)
    }

    /// StartTournament: generate the bracket, move to InProgress, stamp every member's pointer,
    /// and count the tournament as hosted by the organizer.
    pub async fn start_tournament(
        &self,
        principal: &Principal,
        id: TournamentId,
    ) -> Result<Tournament, TournamentError> {
        let Versioned { version, value: mut tournament } = self.get_tournament(id).await?;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::Start)?;
        {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            logic::start_tournament(&mut tournament, &mut *rng)?;
        }

        let key = DocKey::tournament(id);
        let mut batch = Batch::new("StartTournament")
            .require(key.clone(), Precondition::Version(version))
            .set(key, &tournament)?;
        for profile in self.existing_profiles(&tournament.member_ids()).await? {
            batch = batch.update(profile, vec![FieldOp::set(ACTIVE_TOURNAMENT, id)?]);
        }
        if self.store.get(&DocKey::user(&tournament.organizer_id)).await?.is_some() {
            batch = batch.update(
                DocKey::user(&tournament.organizer_id),
                vec![FieldOp::increment("stats.tournaments_hosted", 1)],
            );
        }
        self.store.commit(batch).await?;
        info!(
            "started tournament {} with {} entries, {} rounds",
            id,
            tournament.players.len(),
            tournament.total_rounds()
        );
        Ok(tournament)
    }

    /// ReportResult: the organizer declares a match winner. Deciding the final also runs
    /// CompleteTournament: played/won counters for every current member, in the same batch.
    ///
    /// Reporting the winner a match already has is a no-op.
    pub async fn report_result(
        &self,
        principal: &Principal,
        id: TournamentId,
        match_id: MatchId,
        winner_id: &str,
    ) -> Result<Tournament, TournamentError> {
        let Versioned { version, value: mut tournament } = self.get_tournament(id).await?;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::DeclareWinner)?;
        let game = tournament
            .get_match(match_id)
            .ok_or_else(|| TournamentError::not_found(format!("Match {match_id}")))?;
        if game.winner.as_ref().is_some_and(|w| w.id() == winner_id) {
            debug!("match {} of {} already won by {}", match_id, id, winner_id);
            return Ok(tournament);
        }
        ensure_declarable(game)?;
        let advancement = logic::record_result(&mut tournament, match_id, winner_id)?;

        let key = DocKey::tournament(id);
        let mut batch = Batch::new("ReportResult")
            .require(key.clone(), Precondition::Version(version))
            .set(key, &tournament)?;
        if let Advancement::Completed { winner } = &advancement {
            batch = self.completion_writes(batch, &tournament, winner).await?;
            info!("tournament {} won by {}", id, winner.name());
        } else {
            debug!("match {} of {}: {:?}", match_id, id, advancement);
        }
        self.store.commit(batch).await?;
        Ok(tournament)
    }

    async fn completion_writes(
        &self,
        mut batch: Batch,
        tournament: &Tournament,
        winner: &Participant,
    ) -> Result<Batch, TournamentError> {
        let winners = winner.member_ids();
        // A winner kicked mid-bracket is no longer on the roster but still gets credited.
        let mut counted = tournament.member_ids();
        let dropped: Vec<AccountId> = winners.iter().filter(|uid| !counted.contains(uid)).cloned().collect();
        counted.extend(dropped);
        for key in self.existing_profiles(&counted).await? {
            let mut ops = vec![FieldOp::increment("stats.tournaments_played", 1)];
            if winners.iter().any(|uid| uid == key.id()) {
                ops.push(FieldOp::increment("stats.tournaments_won", 1));
            }
            batch = batch.update(key, ops);
        }
        Ok(batch)
    }

    /// DeleteTournament: remove the record and its teams; clear members' pointers.
    pub async fn delete_tournament(
        &self,
        principal: &Principal,
        id: TournamentId,
    ) -> Result<(), TournamentError> {
        let Versioned { version, value: tournament } = self.get_tournament(id).await?;
        ensure_organizer(&tournament, &principal.account_id, OrganizerAction::Delete)?;

        // The member list below is only complete if the roster is unchanged since the read.
        let mut batch = Batch::new("DeleteTournament")
            .require(DocKey::tournament(id), Precondition::Version(version))
            .delete(DocKey::tournament(id));
        for team in self.store.query(&teams_collection(id), &[]).await? {
            batch = batch.delete(team.key);
        }
        let batch = self.clear_pointers(batch, &tournament.member_ids(), id).await?;
        self.store.commit(batch).await?;
        info!("deleted tournament {}", id);
        Ok(())
    }

    // ---- teams ----------------------------------------------------------------------------

    pub async fn get_team(
        &self,
        tournament_id: TournamentId,
        team_id: &str,
    ) -> Result<Versioned<Team>, TournamentError> {
        self.store
            .get(&DocKey::team(tournament_id, team_id))
            .await?
            .ok_or_else(|| TournamentError::not_found("Team"))?
            .decode()
    }

    /// Team `uid` belongs to in this tournament.
    pub async fn team_of(
        &self,
        tournament: &Tournament,
        uid: &str,
    ) -> Result<Versioned<Team>, TournamentError> {
        let entry = tournament
            .entry_of(uid)
            .and_then(Participant::as_team)
            .ok_or(TournamentError::NotRegistered)?;
        self.get_team(tournament.id, &entry.id).await
    }

    async fn open_team_tournament(&self, id: TournamentId) -> Result<Tournament, TournamentError> {
        let tournament = self.get_tournament(id).await?.value;
        if !tournament.kind.is_team_mode() || tournament.status != TournamentStatus::Setup {
            return Err(TournamentError::InvalidState);
        }
        Ok(tournament)
    }

    /// Write `team` to its document (guarded by `version`) and mirror it into the roster.
    fn team_batch(name: &'static str, team: &Team, version: u64) -> Result<Batch, TournamentError> {
        let key = DocKey::tournament(team.tournament_id);
        let team_key = DocKey::team(team.tournament_id, &team.id);
        let entry = Participant::Team(team.clone());
        Ok(Batch::new(name)
            .require(team_key.clone(), Precondition::Version(version))
            .require(key.clone(), Precondition::field_equals("status", TournamentStatus::Setup)?)
            .set(team_key, team)?
            .update(key, vec![FieldOp::array_upsert("players", "id", &entry)?]))
    }

    /// InviteMember: the captain adds an account that is not yet entered in this tournament.
    pub async fn invite_member(
        &self,
        principal: &Principal,
        tournament_id: TournamentId,
        invitee_uid: &str,
    ) -> Result<Team, TournamentError> {
        let Versioned { version: invitee_version, value: invitee } =
            self.versioned_profile(invitee_uid).await?;
        let tournament = self.open_team_tournament(tournament_id).await?;
        let Versioned { version, value: mut team } = self.team_of(&tournament, &principal.account_id).await?;
        if !team.has_member(invitee_uid) && tournament.is_registered(invitee_uid) {
            return Err(TournamentError::AlreadyRegistered);
        }
        logic::invite_member(&mut team, &principal.account_id, invitee.as_member())?;

        let user_key = DocKey::user(invitee_uid);
        let batch = Self::team_batch("InviteMember", &team, version)?
            .require(user_key.clone(), Precondition::Version(invitee_version))
            .update(user_key, vec![FieldOp::set(ACTIVE_TOURNAMENT, tournament_id)?]);
        self.store.commit(batch).await?;
        info!("{} joined team {}", invitee.username, team.name);
        Ok(team)
    }

    /// RemoveMember: the captain drops a non-captain member.
    pub async fn remove_member(
        &self,
        principal: &Principal,
        tournament_id: TournamentId,
        member_uid: &str,
    ) -> Result<Team, TournamentError> {
        let tournament = self.open_team_tournament(tournament_id).await?;
        let Versioned { version, value: mut team } = self.team_of(&tournament, &principal.account_id).await?;
        let removed = logic::remove_member(&mut team, &principal.account_id, member_uid)?;

        let batch = Self::team_batch("RemoveMember", &team, version)?;
        let batch = self.clear_pointers(batch, &[removed.uid.clone()], tournament_id).await?;
        self.store.commit(batch).await?;
        info!("{} removed from team {}", removed.username, team.name);
        Ok(team)
    }

    /// LeaveTeam: a member leaves; the captain leaving disbands the team and withdraws it.
    pub async fn leave_team(
        &self,
        principal: &Principal,
        tournament_id: TournamentId,
    ) -> Result<LeaveOutcome, TournamentError> {
        let tournament = self.open_team_tournament(tournament_id).await?;
        let Versioned { version, value: mut team } = self.team_of(&tournament, &principal.account_id).await?;
        let members = team.members.iter().map(|m| m.uid.clone()).collect::<Vec<_>>();
        let outcome = logic::leave_team(&mut team, &principal.account_id)?;

        let batch = match &outcome {
            LeaveOutcome::Disbanded => {
                let key = DocKey::tournament(tournament_id);
                let batch = Batch::new("LeaveTeam")
                    .require(DocKey::team(tournament_id, &team.id), Precondition::Version(version))
                    .delete(DocKey::team(tournament_id, &team.id))
                    .update(key, vec![FieldOp::array_remove("players", "id", team.id.as_str())]);
                self.clear_pointers(batch, &members, tournament_id).await?
            }
            LeaveOutcome::Left(member) => {
                let batch = Self::team_batch("LeaveTeam", &team, version)?;
                self.clear_pointers(batch, &[member.uid.clone()], tournament_id).await?
            }
        };
        self.store.commit(batch).await?;
        info!("{} left team {} ({:?})", principal.account_id, team.name, outcome);
        Ok(outcome)
    }

    /// Invite candidates for the caller's team: prefix search minus current members.
    pub async fn invite_candidates(
        &self,
        principal: &Principal,
        tournament_id: TournamentId,
        prefix: &str,
    ) -> Result<Vec<UserProfile>, TournamentError> {
        let tournament = self.get_tournament(tournament_id).await?.value;
        let team = self.team_of(&tournament, &principal.account_id).await?.value;
        let found = self.search_users(prefix).await?;
        Ok(logic::invite_candidates(found, &team))
    }
}
