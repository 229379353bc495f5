//! Sync sources and the store they are read from.
//!
//! Sync sources are created and edited elsewhere; this service only reads
//! them. [`InMemorySyncSourceStore`] backs local runs and tests.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read sync sources: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed sync source data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid sync source data: {0}")]
    Invalid(String),
}

/// A stored description of a recurring external-data sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSource {
    pub id: String,
    pub project_id: String,
    pub base_id: String,
    /// Owning user.
    pub fk_user_id: Option<String>,
    /// Free-form settings copied into every job the source triggers.
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Read access to sync sources and their owners.
#[async_trait]
pub trait SyncSourceStore: Send + Sync {
    async fn get(&self, sync_id: &str) -> Result<Option<SyncSource>, StoreError>;

    /// The owning user as an opaque object, if the source has one.
    async fn user_for(&self, source: &SyncSource) -> Result<Option<Value>, StoreError>;
}

/// Shape of a seed file for [`InMemorySyncSourceStore::from_json_file`].
#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    sources: Vec<SyncSource>,
    /// User objects; each must carry a string `id`.
    #[serde(default)]
    users: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct InMemorySyncSourceStore {
    sources: RwLock<HashMap<String, SyncSource>>,
    users: RwLock<HashMap<String, Value>>,
}

impl InMemorySyncSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sources and users from a JSON document of the form
    /// `{"sources": [...], "users": [...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let seed: SeedFile = serde_json::from_str(raw)?;

        let mut users = HashMap::with_capacity(seed.users.len());
        for user in seed.users {
            let id = user
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::Invalid("user entry without string id".into()))?
                .to_string();
            users.insert(id, user);
        }
        let sources = seed
            .sources
            .into_iter()
            .map(|source| (source.id.clone(), source))
            .collect();

        Ok(Self {
            sources: RwLock::new(sources),
            users: RwLock::new(users),
        })
    }

    pub async fn insert_source(&self, source: SyncSource) {
        self.sources.write().await.insert(source.id.clone(), source);
    }

    pub async fn insert_user(&self, id: impl Into<String>, user: Value) {
        self.users.write().await.insert(id.into(), user);
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }
}

#[async_trait]
impl SyncSourceStore for InMemorySyncSourceStore {
    async fn get(&self, sync_id: &str) -> Result<Option<SyncSource>, StoreError> {
        Ok(self.sources.read().await.get(sync_id).cloned())
    }

    async fn user_for(&self, source: &SyncSource) -> Result<Option<Value>, StoreError> {
        let Some(user_id) = source.fk_user_id.as_deref() else {
            return Ok(None);
        };
        Ok(self.users.read().await.get(user_id).cloned())
    }
}
