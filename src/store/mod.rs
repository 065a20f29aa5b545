//! Document store interface: keyed JSON documents, atomic batches, queries, subscriptions.
//!
//! Every record the core persists (tournaments, teams, profiles) lives in a store behind
//! [`DocumentStore`]. Writes go through [`Batch`]es so a multi-document change lands all at
//! once or not at all. List fields that several actors touch concurrently are only changed
//! through the commutative [`FieldOp::ArrayUnion`] / [`FieldOp::ArrayRemove`] deltas.

mod blob;
mod memory;

pub use blob::{BlobStore, MemoryBlobStore};
pub use memory::MemoryStore;

use crate::models::{TournamentError, TournamentId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tokio::sync::watch;

/// Raw document body.
pub type Document = Value;

/// Path of a document, e.g. `tournaments/{id}` or `tournaments/{id}/teams/{team}`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DocKey(String);

impl DocKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn tournament(id: TournamentId) -> Self {
        Self(format!("{TOURNAMENTS}/{id}"))
    }

    pub fn team(tournament_id: TournamentId, team_id: &str) -> Self {
        Self(format!("{}/{team_id}", teams_collection(tournament_id)))
    }

    pub fn user(uid: &str) -> Self {
        Self(format!("{USERS}/{uid}"))
    }

    pub fn username(name: &str) -> Self {
        Self(format!("{USERNAMES}/{name}"))
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Everything before the last segment.
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map(|(c, _)| c).unwrap_or("")
    }

    /// Last segment.
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, id)| id).unwrap_or(&self.0)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const TOURNAMENTS: &str = "tournaments";
pub const USERS: &str = "users";
pub const USERNAMES: &str = "usernames";

pub fn teams_collection(tournament_id: TournamentId) -> String {
    format!("{TOURNAMENTS}/{tournament_id}/teams")
}

/// A document as read from the store, with the version of the write that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub key: DocKey,
    pub version: u64,
    pub data: Document,
}

impl Snapshot {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Versioned<T>, TournamentError> {
        Ok(Versioned {
            version: self.version,
            value: serde_json::from_value(self.data.clone())?,
        })
    }
}

/// A typed record together with the store version it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// In-place change to one field. `field` may be a dotted path into nested objects.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldOp {
    Set { field: String, value: Value },
    /// Append `element` unless an element with the same `key` value is already present.
    ArrayUnion { field: String, key: String, element: Value },
    /// Drop every element whose `key` equals `value`.
    ArrayRemove { field: String, key: String, value: Value },
    /// Replace the element with the same `key` value in place, or append it.
    ArrayUpsert { field: String, key: String, element: Value },
    Increment { field: String, by: i64 },
    /// Set to null only if the field currently equals `value`.
    ClearIfEquals { field: String, value: Value },
}

impl FieldOp {
    pub fn set(field: &str, value: impl Serialize) -> Result<Self, TournamentError> {
        Ok(FieldOp::Set {
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn array_union(field: &str, key: &str, element: impl Serialize) -> Result<Self, TournamentError> {
        Ok(FieldOp::ArrayUnion {
            field: field.to_string(),
            key: key.to_string(),
            element: serde_json::to_value(element)?,
        })
    }

    pub fn array_upsert(field: &str, key: &str, element: impl Serialize) -> Result<Self, TournamentError> {
        Ok(FieldOp::ArrayUpsert {
            field: field.to_string(),
            key: key.to_string(),
            element: serde_json::to_value(element)?,
        })
    }

    pub fn array_remove(field: &str, key: &str, value: impl Into<Value>) -> Self {
        FieldOp::ArrayRemove {
            field: field.to_string(),
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn increment(field: &str, by: i64) -> Self {
        FieldOp::Increment {
            field: field.to_string(),
            by,
        }
    }

    pub fn clear_if_equals(field: &str, value: impl Into<Value>) -> Self {
        FieldOp::ClearIfEquals {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Condition a document must satisfy for a batch to commit.
#[derive(Clone, Debug, PartialEq)]
pub enum Precondition {
    /// Document exists at exactly this version.
    Version(u64),
    /// Document exists and `field` currently holds `value`.
    FieldEquals { field: String, value: Value },
    Exists,
    Missing,
}

impl Precondition {
    pub fn field_equals(field: &str, value: impl Serialize) -> Result<Self, TournamentError> {
        Ok(Precondition::FieldEquals {
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// Create or replace the whole document.
    Set { key: DocKey, data: Document },
    /// Patch an existing document.
    Update { key: DocKey, ops: Vec<FieldOp> },
    Delete { key: DocKey },
}

impl Write {
    pub fn key(&self) -> &DocKey {
        match self {
            Write::Set { key, .. } | Write::Update { key, .. } | Write::Delete { key } => key,
        }
    }
}

/// Named group of writes applied atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub name: &'static str,
    pub preconditions: Vec<(DocKey, Precondition)>,
    pub writes: Vec<Write>,
}

impl Batch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            preconditions: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn require(mut self, key: DocKey, precondition: Precondition) -> Self {
        self.preconditions.push((key, precondition));
        self
    }

    pub fn set(mut self, key: DocKey, data: impl Serialize) -> Result<Self, TournamentError> {
        let data = serde_json::to_value(data)?;
        self.writes.push(Write::Set { key, data });
        Ok(self)
    }

    pub fn update(mut self, key: DocKey, ops: Vec<FieldOp>) -> Self {
        if !ops.is_empty() {
            self.writes.push(Write::Update { key, ops });
        }
        self
    }

    pub fn delete(mut self, key: DocKey) -> Self {
        self.writes.push(Write::Delete { key });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Filter applied to documents of one collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    /// String field starting with `prefix` (range query).
    Prefix { field: String, prefix: String },
}

impl Filter {
    pub fn eq(field: &str, value: impl Serialize) -> Result<Self, TournamentError> {
        Ok(Filter::Eq {
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn prefix(field: &str, prefix: impl Into<String>) -> Self {
        Filter::Prefix {
            field: field.to_string(),
            prefix: prefix.into(),
        }
    }
}

/// Live view of one document. Always holds the latest state; intermediate states may be
/// skipped. Dropping or [`close`](Subscription::close)-ing it ends the subscription.
#[derive(Debug)]
pub struct Subscription {
    key: DocKey,
    receiver: watch::Receiver<Option<Snapshot>>,
}

impl Subscription {
    pub(crate) fn new(key: DocKey, receiver: watch::Receiver<Option<Snapshot>>) -> Self {
        Self { key, receiver }
    }

    pub fn key(&self) -> &DocKey {
        &self.key
    }

    /// Latest known state (`None` if the document does not exist).
    pub fn current(&self) -> Option<Snapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return the state after it. Returns `None` once the store
    /// has shut down.
    pub async fn next(&mut self) -> Option<Option<Snapshot>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn close(self) {
        log::debug!("closing subscription to {}", self.key);
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &DocKey) -> Result<Option<Snapshot>, TournamentError>;

    /// Apply every write of `batch` atomically, or none of them.
    async fn commit(&self, batch: Batch) -> Result<(), TournamentError>;

    /// Documents directly inside `collection` matching every filter, ordered by key.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Snapshot>, TournamentError>;

    async fn subscribe(&self, key: &DocKey) -> Result<Subscription, TournamentError>;

    async fn set(&self, key: DocKey, data: Document) -> Result<(), TournamentError> {
        self.commit(Batch::new("set").set(key, data)?).await
    }

    async fn update(&self, key: DocKey, ops: Vec<FieldOp>) -> Result<(), TournamentError> {
        self.commit(Batch::new("update").update(key, ops)).await
    }

    async fn delete(&self, key: DocKey) -> Result<(), TournamentError> {
        self.commit(Batch::new("delete").delete(key)).await
    }
}
