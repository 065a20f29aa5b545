//! Blob storage for uploaded images (profile pictures).

use crate::models::TournamentError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a durable URL for them.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, TournamentError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes stored under `url`.
    pub fn get(&self, url: &str) -> Option<(String, Vec<u8>)> {
        self.blobs.lock().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, TournamentError> {
        let url = format!("memory://blobs/{}", Uuid::new_v4());
        self.blobs
            .lock()
            .map_err(|_| TournamentError::StoreUnavailable("blob store lock poisoned".into()))?
            .insert(url.clone(), (content_type.to_string(), bytes));
        Ok(url)
    }
}
