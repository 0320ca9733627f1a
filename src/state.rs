//! Application state: the single progression engine, the state store and the
//! channel that pushes deferred updates to WebSocket clients.
//!
//! There is one player per server process. The engine sits behind a mutex
//! and every request takes it for the duration of one engine call.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument};

use crate::catalog::{load_catalog, Catalog};
use crate::config::AppConfig;
use crate::engine::{EngineSettings, ProgressionEngine};
use crate::error::CatalogError;
use crate::persistence::{load_state, JsonFileStore, MemoryStore, StateStore};
use crate::protocol::ServerWsMessage;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

pub struct AppState {
    pub engine: Mutex<ProgressionEngine>,
    pub store: Arc<dyn StateStore>,
    pub fallback_to_sequential: bool,
    /// Pushed outcomes of deferred transitions (new state, or an error).
    pub updates: broadcast::Sender<ServerWsMessage>,
}

impl AppState {
    /// Build state from config: catalog, store, saved progress, first puzzle.
    #[instrument(level = "info", skip_all)]
    pub fn new(cfg: &AppConfig) -> Result<Self, CatalogError> {
        let catalog = Arc::new(load_catalog(cfg.storage.catalog_path.as_deref())?);

        let store: Arc<dyn StateStore> = match &cfg.storage.state_path {
            Some(path) => {
                info!(target: "codesnap_backend", %path, "Persisting progress to file");
                Arc::new(JsonFileStore::new(path))
            }
            None => {
                info!(target: "codesnap_backend", "No state path configured; progress kept in memory");
                Arc::new(MemoryStore::default())
            }
        };

        let settings = EngineSettings::from_config(cfg);
        let engine = match load_state(store.as_ref(), &catalog) {
            Some(saved) => {
                info!(
                    target: "codesnap_backend",
                    elo = saved.progress.elo,
                    solved = saved.progress.solved_puzzles.len(),
                    index = saved.progress.current_puzzle_index,
                    "Restored saved progress"
                );
                ProgressionEngine::restore(catalog, settings, saved.progress, saved.developer)
            }
            None => ProgressionEngine::new(catalog, settings),
        };

        Ok(Self::from_engine(engine, store, cfg.selection.fallback_to_sequential))
    }

    /// Wrap a ready engine; loads its current puzzle.
    pub fn from_engine(
        mut engine: ProgressionEngine,
        store: Arc<dyn StateStore>,
        fallback_to_sequential: bool,
    ) -> Self {
        if engine.attempt().is_none() {
            engine.load_puzzle();
        }
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            engine: Mutex::new(engine),
            store,
            fallback_to_sequential,
            updates,
        }
    }

    /// Convenience for tests and embedders: built-in catalog, in-memory store.
    pub fn in_memory(settings: EngineSettings, seed: u64) -> Result<Self, CatalogError> {
        let catalog = Arc::new(Catalog::builtin()?);
        let engine = ProgressionEngine::new(catalog, settings).with_seed(seed);
        Ok(Self::from_engine(engine, Arc::new(MemoryStore::default()), true))
    }
}
