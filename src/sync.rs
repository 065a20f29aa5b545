//! Client-side tournament view: optimistic local edits reconciled against store snapshots.
//!
//! A local edit is applied to a private copy straight away. The next authoritative snapshot
//! replaces local state wholesale, whatever the edit did: the store's last write wins.

use crate::models::{Tournament, TournamentError};
use crate::store::{Snapshot, Subscription, Versioned};

#[derive(Clone, Debug, Default)]
pub struct TournamentView {
    authoritative: Option<Versioned<Tournament>>,
    optimistic: Option<Tournament>,
}

impl TournamentView {
    pub fn new() -> Self {
        Self::default()
    }

    /// What the viewer should see: the optimistic copy if one is pending, else the last snapshot.
    pub fn current(&self) -> Option<&Tournament> {
        self.optimistic
            .as_ref()
            .or(self.authoritative.as_ref().map(|v| &v.value))
    }

    /// Version of the last snapshot applied.
    pub fn version(&self) -> Option<u64> {
        self.authoritative.as_ref().map(|v| v.version)
    }

    pub fn has_pending(&self) -> bool {
        self.optimistic.is_some()
    }

    /// Apply `edit` to a local copy. A failing edit leaves the view unchanged.
    pub fn apply_optimistic<T>(
        &mut self,
        edit: impl FnOnce(&mut Tournament) -> Result<T, TournamentError>,
    ) -> Result<T, TournamentError> {
        let mut draft = self
            .current()
            .cloned()
            .ok_or_else(|| TournamentError::not_found("Tournament"))?;
        let out = edit(&mut draft)?;
        self.optimistic = Some(draft);
        Ok(out)
    }

    /// Replace local state with `snapshot`. Returns false if it is older than what we hold.
    /// `None` means the tournament was deleted.
    pub fn reconcile(&mut self, snapshot: Option<&Snapshot>) -> Result<bool, TournamentError> {
        let Some(snapshot) = snapshot else {
            self.authoritative = None;
            self.optimistic = None;
            return Ok(true);
        };
        if self.version().is_some_and(|v| v > snapshot.version) {
            return Ok(false);
        }
        self.authoritative = Some(snapshot.decode()?);
        self.optimistic = None;
        Ok(true)
    }

    /// Wait for the subscription's next snapshot and reconcile with it. Returns false once the
    /// subscription has ended.
    pub async fn follow(&mut self, subscription: &mut Subscription) -> Result<bool, TournamentError> {
        match subscription.next().await {
            Some(snapshot) => {
                self.reconcile(snapshot.as_ref())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
