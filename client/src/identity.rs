//! Viewer identity: an opaque id created once, persisted locally and sent
//! with every scoped request until the viewer signs out.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};

/// Durable home for the viewer id.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, user_id: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    user_id: String,
}

/// JSON file store, `{"user_id": "..."}`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fail(&self, message: impl ToString) -> ClientError {
        ClientError::Identity {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl IdentityStore for FileStore {
    fn load(&self) -> Result<Option<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.fail(e)),
        };
        let stored: StoredIdentity = serde_json::from_str(&content).map_err(|e| self.fail(e))?;
        let id = stored.user_id.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    fn save(&self, user_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.fail(e))?;
        }
        let body = serde_json::to_string_pretty(&StoredIdentity {
            user_id: user_id.to_string(),
        })
        .map_err(|e| self.fail(e))?;
        fs::write(&self.path, body).map_err(|e| self.fail(e))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }
}

/// Process-local store; forgets everything on exit.
#[derive(Default)]
pub struct MemoryStore {
    user_id: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_id(user_id: &str) -> Self {
        Self {
            user_id: Mutex::new(Some(user_id.to_string())),
        }
    }
}

impl IdentityStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.user_id.lock().clone())
    }

    fn save(&self, user_id: &str) -> Result<()> {
        *self.user_id.lock() = Some(user_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.user_id.lock() = None;
        Ok(())
    }
}

/// Shared handle over a store with a read-through cache.
#[derive(Clone)]
pub struct Identity {
    store: Arc<dyn IdentityStore>,
    cached: Arc<RwLock<Option<String>>>,
    provisioning: Arc<tokio::sync::Mutex<()>>,
}

impl Identity {
    pub fn new(store: impl IdentityStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
            cached: Arc::new(RwLock::new(None)),
            provisioning: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// The stored viewer id, if one exists. Never creates one.
    pub fn current(&self) -> Result<Option<String>> {
        if let Some(id) = self.cached.read().clone() {
            return Ok(Some(id));
        }
        let loaded = self.store.load()?;
        if let Some(ref id) = loaded {
            *self.cached.write() = Some(id.clone());
        }
        Ok(loaded)
    }

    /// Use an id the viewer already owns, e.g. one issued on another machine.
    pub fn adopt(&self, user_id: &str) -> Result<String> {
        let trimmed = user_id.trim();
        let parsed = Uuid::parse_str(trimmed)
            .map_err(|_| ClientError::InvalidViewerId(trimmed.to_string()))?;
        let id = parsed.hyphenated().to_string();
        self.remember(&id)?;
        info!(user_id = %id, "adopted viewer id");
        Ok(id)
    }

    /// Delete the stored id. The next scoped request provisions a new one.
    pub fn forget(&self) -> Result<()> {
        self.store.clear()?;
        *self.cached.write() = None;
        Ok(())
    }

    fn remember(&self, user_id: &str) -> Result<()> {
        self.store.save(user_id)?;
        *self.cached.write() = Some(user_id.to_string());
        Ok(())
    }
}

impl ApiClient {
    /// Return the viewer id, provisioning one on first use.
    ///
    /// The store is asked for an anonymous id first. If it cannot be reached
    /// a random UUID is minted locally so the viewer keeps a stable identity;
    /// any other failure is returned.
    pub async fn ensure_viewer(&self) -> Result<String> {
        let identity = self.identity();
        if let Some(id) = identity.current()? {
            return Ok(id);
        }

        let _guard = identity.provisioning.lock().await;
        // Another caller may have finished provisioning while we waited.
        if let Some(id) = identity.current()? {
            return Ok(id);
        }

        let id = match self.create_anon().await {
            Ok(anon) => {
                info!(user_id = %anon.user_id, "provisioned anonymous viewer");
                anon.user_id
            }
            Err(e) if e.is_offline() => {
                let local = Uuid::new_v4().to_string();
                warn!(error = %e, user_id = %local, "store unreachable, minted local viewer id");
                local
            }
            Err(e) => return Err(e),
        };
        identity.remember(&id)?;
        Ok(id)
    }
}
