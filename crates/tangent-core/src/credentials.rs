//! Provider credentials, persisted as one JSON blob in a key-value store
//!
//! The store mirrors browser local storage: string keys, string values, and a
//! single fixed key holding the whole credential list. Keys are stored
//! verbatim.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::ModelCatalog;
use crate::provider::Provider;

/// Storage key for the credential list
pub const CREDENTIALS_KEY: &str = "tangent.credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub provider: Provider,
    pub key: String,
    pub label: String,
}

impl Credential {
    pub fn new(provider: Provider, key: &str, label: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            key: key.to_string(),
            label: label.to_string(),
        }
    }

    /// Key with everything but the last four characters hidden
    pub fn masked_key(&self) -> String {
        let count = self.key.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = self.key.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }
}

/// First credential whose provider serves `model_name`
pub fn credential_for_model<'a>(
    credentials: &'a [Credential],
    catalog: &ModelCatalog,
    model_name: &str,
) -> Option<&'a Credential> {
    let provider = catalog.provider_for(model_name)?;
    credentials.iter().find(|c| c.provider == provider)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// String key-value persistence
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: LocalStorage + ?Sized> LocalStorage for Box<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }
}

/// In-process storage, used by tests and when no config directory exists
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by one JSON object file
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf, StorageError> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(config_dir.join("tangent").join("local_storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = match self.read_all() {
            Ok(items) => items,
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "replacing unreadable storage file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        items.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write beside the target then rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

pub struct KeyStore<S: LocalStorage> {
    storage: S,
}

impl<S: LocalStorage> KeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Persisted credentials. Absent or unreadable data yields an empty list,
    /// which callers treat as first run.
    pub fn load(&self) -> Vec<Credential> {
        match self.storage.get_item(CREDENTIALS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "stored credentials are malformed, starting onboarding");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("no stored credentials");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "could not read credential storage");
                Vec::new()
            }
        }
    }

    /// Replace the whole persisted list with `credentials`
    pub fn save(&mut self, credentials: &[Credential]) -> Result<(), StorageError> {
        let blob = serde_json::to_string(credentials)?;
        self.storage.set_item(CREDENTIALS_KEY, &blob)
    }
}
