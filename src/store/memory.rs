//! In-process document store.

use super::{Batch, DocKey, Document, DocumentStore, FieldOp, Filter, Precondition, Snapshot, Subscription, Write};
use crate::models::TournamentError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Data {
    docs: BTreeMap<DocKey, (u64, Document)>,
    watchers: HashMap<DocKey, watch::Sender<Option<Snapshot>>>,
    /// Last version handed out; shared by all documents so versions never repeat.
    last_version: u64,
}

/// Store keeping every document in memory. Cheap to clone; clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    conn: Arc<Mutex<Data>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().map(|d| d.docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Data>, TournamentError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TournamentError::StoreUnavailable("store is offline".into()));
        }
        self.conn
            .lock()
            .map_err(|_| TournamentError::StoreUnavailable("lock poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> Result<Option<Snapshot>, TournamentError> {
        let data = self.lock()?;
        Ok(data.docs.get(key).map(|(version, doc)| Snapshot {
            key: key.clone(),
            version: *version,
            data: doc.clone(),
        }))
    }

    async fn commit(&self, batch: Batch) -> Result<(), TournamentError> {
        let mut data = self.lock()?;

        for (key, precondition) in &batch.preconditions {
            let current = data.docs.get(key);
            let ok = match (precondition, current) {
                (Precondition::Version(expected), Some((actual, _))) => expected == actual,
                (Precondition::FieldEquals { field, value }, Some((_, doc))) => {
                    lookup(doc, field) == Some(value)
                }
                (Precondition::Version(_) | Precondition::FieldEquals { .. }, None) => false,
                (Precondition::Exists, found) => found.is_some(),
                (Precondition::Missing, found) => found.is_none(),
            };
            if !ok {
                log::debug!("{}: precondition {:?} failed on {}", batch.name, precondition, key);
                return Err(match precondition {
                    Precondition::Exists => TournamentError::not_found(key.to_string()),
                    _ => TournamentError::StaleWrite,
                });
            }
        }

        // Stage every write first so a failing one leaves the store untouched.
        let mut staged: BTreeMap<DocKey, Option<Document>> = BTreeMap::new();
        for write in &batch.writes {
            let key = write.key().clone();
            let current = match staged.get(&key) {
                Some(doc) => doc.clone(),
                None => data.docs.get(&key).map(|(_, d)| d.clone()),
            };
            let next = match write {
                Write::Set { data, .. } => Some(data.clone()),
                Write::Delete { .. } => None,
                Write::Update { ops, .. } => {
                    let mut doc = current.ok_or_else(|| TournamentError::not_found(key.to_string()))?;
                    for op in ops {
                        apply_op(&mut doc, op)?;
                    }
                    Some(doc)
                }
            };
            staged.insert(key, next);
        }

        let mut changed = Vec::with_capacity(staged.len());
        for (key, doc) in staged {
            let snapshot = match doc {
                Some(doc) => {
                    data.last_version += 1;
                    let version = data.last_version;
                    data.docs.insert(key.clone(), (version, doc.clone()));
                    Some(Snapshot {
                        key: key.clone(),
                        version,
                        data: doc,
                    })
                }
                None => {
                    data.docs.remove(&key);
                    None
                }
            };
            changed.push((key, snapshot));
        }
        log::debug!("{}: committed {} document(s)", batch.name, changed.len());

        for (key, snapshot) in changed {
            let closed = match data.watchers.get(&key) {
                Some(sender) => {
                    sender.send_replace(snapshot);
                    sender.receiver_count() == 0
                }
                None => false,
            };
            if closed {
                data.watchers.remove(&key);
            }
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Snapshot>, TournamentError> {
        let data = self.lock()?;
        Ok(data
            .docs
            .iter()
            .filter(|(key, _)| key.collection() == collection)
            .filter(|(_, (_, doc))| filters.iter().all(|f| matches_filter(doc, f)))
            .map(|(key, (version, doc))| Snapshot {
                key: key.clone(),
                version: *version,
                data: doc.clone(),
            })
            .collect())
    }

    async fn subscribe(&self, key: &DocKey) -> Result<Subscription, TournamentError> {
        let mut data = self.lock()?;
        let current = data.docs.get(key).map(|(version, doc)| Snapshot {
            key: key.clone(),
            version: *version,
            data: doc.clone(),
        });
        // Senders whose subscriptions were all dropped would otherwise live until their key is
        // written again.
        data.watchers.retain(|_, sender| sender.receiver_count() > 0);
        let receiver = match data.watchers.get(key) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(current);
                data.watchers.insert(key.clone(), sender);
                receiver
            }
        };
        Ok(Subscription::new(key.clone(), receiver))
    }
}

fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { field, value } => lookup(doc, field) == Some(value),
        Filter::Prefix { field, prefix } => lookup(doc, field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with(prefix.as_str())),
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |v, segment| v.get(segment))
}

/// Walk `path`, creating empty objects along the way, and return the slot for the last segment.
fn slot_mut<'a>(doc: &'a mut Document, path: &str) -> Result<&'a mut Value, TournamentError> {
    let mut current = doc;
    for segment in path.split('.') {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let object = current
            .as_object_mut()
            .ok_or_else(|| TournamentError::Codec(format!("{path}: not an object")))?;
        current = object.entry(segment.to_string()).or_insert(Value::Null);
    }
    Ok(current)
}

fn apply_op(doc: &mut Document, op: &FieldOp) -> Result<(), TournamentError> {
    match op {
        FieldOp::Set { field, value } => {
            *slot_mut(doc, field)? = value.clone();
        }
        FieldOp::ArrayUnion { field, key, element } => {
            let slot = slot_mut(doc, field)?;
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot
                .as_array_mut()
                .ok_or_else(|| TournamentError::Codec(format!("{field}: not an array")))?;
            let id = element.get(key);
            if !items.iter().any(|item| item.get(key) == id) {
                items.push(element.clone());
            }
        }
        FieldOp::ArrayUpsert { field, key, element } => {
            let slot = slot_mut(doc, field)?;
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot
                .as_array_mut()
                .ok_or_else(|| TournamentError::Codec(format!("{field}: not an array")))?;
            let id = element.get(key);
            match items.iter_mut().find(|item| item.get(key) == id) {
                Some(item) => *item = element.clone(),
                None => items.push(element.clone()),
            }
        }
        FieldOp::ArrayRemove { field, key, value } => {
            if let Some(items) = slot_mut(doc, field)?.as_array_mut() {
                items.retain(|item| item.get(key) != Some(value));
            }
        }
        FieldOp::Increment { field, by } => {
            let slot = slot_mut(doc, field)?;
            let current = slot.as_i64().unwrap_or(0);
            *slot = Value::from(current + by);
        }
        FieldOp::ClearIfEquals { field, value } => {
            let slot = slot_mut(doc, field)?;
            if slot == value {
                *slot = Value::Null;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn union_is_keyed_and_commutative() {
        let store = MemoryStore::new();
        let key = DocKey::new("tournaments/t1");
        store.set(key.clone(), json!({ "players": [] })).await.unwrap();

        let a = FieldOp::array_union("players", "id", json!({ "id": "a" })).unwrap();
        let b = FieldOp::array_union("players", "id", json!({ "id": "b" })).unwrap();
        store.update(key.clone(), vec![a.clone()]).await.unwrap();
        store.update(key.clone(), vec![b, a]).await.unwrap();

        let doc = store.get(&key).await.unwrap().unwrap();
        assert_eq!(doc.data["players"], json!([{ "id": "a" }, { "id": "b" }]));
    }

    #[tokio::test]
    async fn failed_precondition_writes_nothing() {
        let store = MemoryStore::new();
        let key = DocKey::new("users/u1");
        store.set(key.clone(), json!({ "n": 1 })).await.unwrap();
        let version = store.get(&key).await.unwrap().unwrap().version;
        store.update(key.clone(), vec![FieldOp::increment("n", 1)]).await.unwrap();

        let batch = Batch::new("stale")
            .require(key.clone(), Precondition::Version(version))
            .update(key.clone(), vec![FieldOp::increment("n", 10)]);
        assert_eq!(store.commit(batch).await, Err(TournamentError::StaleWrite));
        assert_eq!(store.get(&key).await.unwrap().unwrap().data["n"], 2);
    }

    #[tokio::test]
    async fn update_of_missing_document_aborts_batch() {
        let store = MemoryStore::new();
        let batch = Batch::new("partial")
            .set(DocKey::new("users/a"), json!({}))
            .unwrap()
            .update(DocKey::new("users/missing"), vec![FieldOp::increment("n", 1)]);
        assert!(matches!(store.commit(batch).await, Err(TournamentError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn nested_increment_creates_path() {
        let store = MemoryStore::new();
        let key = DocKey::user("u1");
        store.set(key.clone(), json!({ "uid": "u1" })).await.unwrap();
        store
            .update(key.clone(), vec![FieldOp::increment("stats.tournaments_won", 1)])
            .await
            .unwrap();
        let doc = store.get(&key).await.unwrap().unwrap();
        assert_eq!(doc.data["stats"]["tournaments_won"], 1);
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get(&DocKey::user("u1")).await,
            Err(TournamentError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn subscription_sees_latest_state() {
        let store = MemoryStore::new();
        let key = DocKey::new("tournaments/t1");
        let mut sub = store.subscribe(&key).await.unwrap();
        assert!(sub.current().is_none());

        store.set(key.clone(), json!({ "n": 1 })).await.unwrap();
        store.set(key.clone(), json!({ "n": 2 })).await.unwrap();
        let latest = sub.next().await.unwrap().unwrap();
        assert_eq!(latest.data["n"], 2);

        store.delete(key.clone()).await.unwrap();
        assert_eq!(sub.next().await, Some(None));
        sub.close();
    }

    #[tokio::test]
    async fn dropped_subscriptions_release_their_watchers() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let sub = store.subscribe(&DocKey::new(format!("tournaments/t{i}"))).await.unwrap();
            sub.close();
        }
        let _live = store.subscribe(&DocKey::new("tournaments/live")).await.unwrap();
        let watchers = store.conn.lock().unwrap().watchers.len();
        assert_eq!(watchers, 1);
    }
}
