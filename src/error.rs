//! Error types for the catalog, the progression engine and the state store.

use thiserror::Error;

/// Problems found while parsing or validating a puzzle catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog contains no puzzles")]
    Empty,
    #[error("invalid puzzle '{puzzle}': {reason}")]
    Invalid { puzzle: String, reason: String },
}

/// Recoverable conditions surfaced by the progression engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Rating-banded selection found nothing in the band. The caller picks a fallback.
    #[error("no eligible puzzle for rating {elo} (difficulty {min_difficulty}..={max_difficulty})")]
    NoEligiblePuzzle {
        elo: u32,
        min_difficulty: u8,
        max_difficulty: u8,
    },
    #[error("no puzzle is loaded")]
    NoActivePuzzle,
}

/// Failures reading or writing the persisted state record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
