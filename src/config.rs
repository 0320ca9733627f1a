//! Loading service configuration (rating curve, selection policy, pacing, storage) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

use crate::rating::{
  RatingCurve, DEFAULT_FAILURE_DELTA, DEFAULT_INITIAL_ELO, DEFAULT_K_FACTOR, DEFAULT_SUCCESS_DELTA,
};
use crate::selection::{default_bands, RatingBand, SelectionMode};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub rating: RatingConfig,
  #[serde(default)]
  pub selection: SelectionConfig,
  #[serde(default)]
  pub pacing: PacingConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
  #[default]
  Fixed,
  Elo,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
  pub initial_elo: u32,
  pub curve: CurveKind,
  pub success_delta: u32,
  pub failure_delta: u32,
  pub k_factor: f64,
}

impl Default for RatingConfig {
  fn default() -> Self {
    Self {
      initial_elo: DEFAULT_INITIAL_ELO,
      curve: CurveKind::Fixed,
      success_delta: DEFAULT_SUCCESS_DELTA,
      failure_delta: DEFAULT_FAILURE_DELTA,
      k_factor: DEFAULT_K_FACTOR,
    }
  }
}

impl RatingConfig {
  pub fn curve(&self) -> RatingCurve {
    match self.curve {
      CurveKind::Fixed => RatingCurve::Fixed {
        success_delta: self.success_delta,
        failure_delta: self.failure_delta,
      },
      CurveKind::Elo => RatingCurve::Elo { k_factor: self.k_factor },
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
  pub mode: SelectionMode,
  /// When the rating band is empty, serve the next puzzle in order instead of failing.
  pub fallback_to_sequential: bool,
  pub bands: Vec<RatingBand>,
}

impl Default for SelectionConfig {
  fn default() -> Self {
    Self { mode: SelectionMode::Sequential, fallback_to_sequential: true, bands: default_bands() }
  }
}

/// Pauses before deferred transitions, so the player can see the feedback.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
  pub section_advance_ms: u64,
  pub puzzle_advance_ms: u64,
}

impl Default for PacingConfig {
  fn default() -> Self {
    Self { section_advance_ms: 800, puzzle_advance_ms: 800 }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
  /// JSON file holding saved progress. In-memory only when unset.
  pub state_path: Option<String>,
  /// Replacement puzzle catalog (TOML). Built-in catalog when unset.
  pub catalog_path: Option<String>,
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Load `AppConfig` from CODESNAP_CONFIG_PATH, then apply CODESNAP_STATE_PATH.
/// Any IO/parse error is logged and the defaults are used.
pub fn load_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("CODESNAP_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_config(&s) {
        Ok(cfg) => {
          info!(target: "codesnap_backend", %path, "Loaded config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "codesnap_backend", %path, error = %e, "Failed to parse TOML config");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "codesnap_backend", %path, error = %e, "Failed to read TOML config file");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(path) = std::env::var("CODESNAP_STATE_PATH") {
    cfg.storage.state_path = Some(path);
  }
  cfg
}
