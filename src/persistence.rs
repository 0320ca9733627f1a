//! Saved state: the player's progress and developer overrides, stamped with a
//! schema version and the fingerprint of the catalog it was recorded against.
//!
//! A record from another schema version or another catalog is discarded and
//! the player starts fresh. Unreadable or unparsable records do the same.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogFingerprint};
use crate::domain::{DeveloperSettings, UserProgress};
use crate::error::StoreError;

pub const STATE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedState {
    pub version: u32,
    pub catalog: CatalogFingerprint,
    pub progress: UserProgress,
    #[serde(default)]
    pub developer: DeveloperSettings,
}

impl SavedState {
    pub fn capture(catalog: &Catalog, progress: &UserProgress, developer: &DeveloperSettings) -> Self {
        Self {
            version: STATE_VERSION,
            catalog: catalog.fingerprint(),
            progress: progress.clone(),
            developer: developer.clone(),
        }
    }
}

/// Where the serialized record lives. Implementations only move bytes.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, record: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, record: &str) -> Result<(), StoreError> {
        // Replace atomically via a sibling temp file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, record)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local store, used when no state path is configured.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
}

impl StateStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.record.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn write(&self, record: &str) -> Result<(), StoreError> {
        *self.record.lock().unwrap_or_else(|p| p.into_inner()) = Some(record.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.record.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

/// Load saved state that still matches `catalog`. Everything else yields None.
pub fn load_state(store: &dyn StateStore, catalog: &Catalog) -> Option<SavedState> {
    let raw = match store.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(target: "codesnap_backend", "No saved state; starting fresh");
            return None;
        }
        Err(e) => {
            warn!(target: "codesnap_backend", error = %e, "Failed to read saved state; starting fresh");
            return None;
        }
    };

    let state: SavedState = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            warn!(target: "codesnap_backend", error = %e, "Saved state is corrupt; starting fresh");
            return None;
        }
    };

    if state.version != STATE_VERSION {
        warn!(target: "codesnap_backend", found = state.version, expected = STATE_VERSION, "Saved state has another schema version; discarding");
        discard(store);
        return None;
    }
    let current = catalog.fingerprint();
    if state.catalog != current {
        warn!(
            target: "codesnap_backend",
            saved_len = state.catalog.len,
            current_len = current.len,
            "Saved state was recorded against a different catalog; discarding"
        );
        discard(store);
        return None;
    }
    Some(state)
}

fn discard(store: &dyn StateStore) {
    if let Err(e) = store.clear() {
        warn!(target: "codesnap_backend", error = %e, "Failed to clear stale saved state");
    }
}

pub fn save_state(store: &dyn StateStore, state: &SavedState) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(state)?;
    store.write(&json)
}
