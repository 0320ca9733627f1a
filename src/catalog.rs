//! The puzzle catalog: read-only puzzle data shared by every attempt.
//!
//! The built-in catalog is compiled into the binary from `data/catalog.toml`.
//! A replacement file can be supplied through the storage config; if it fails
//! to load or validate we log and keep the built-in one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{Puzzle, Section};
use crate::error::CatalogError;
use crate::template;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.toml");

/// A validated, non-empty puzzle list. Only built through `validate`.
#[derive(Clone, Debug)]
pub struct Catalog {
  puzzles: Vec<Puzzle>,
}

/// File shape before validation.
#[derive(Deserialize)]
struct RawCatalog {
  puzzles: Vec<Puzzle>,
}

/// Identity of a catalog, stored next to saved progress to detect stale state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogFingerprint {
  pub len: usize,
  pub ids: Vec<String>,
}

/// Row of the puzzle list shown to the player.
#[derive(Clone, Debug, Serialize)]
pub struct PuzzleSummary {
  pub index: usize,
  pub id: String,
  pub title: String,
  pub description: String,
  pub difficulty: u8,
  pub difficulty_label: &'static str,
  pub section_count: usize,
}

impl Catalog {
  /// The catalog shipped with the binary.
  pub fn builtin() -> Result<Self, CatalogError> {
    Self::from_toml_str(BUILTIN_CATALOG)
  }

  pub fn from_toml_str(s: &str) -> Result<Self, CatalogError> {
    let raw: RawCatalog = toml::from_str(s)?;
    Self::from_puzzles(raw.puzzles)
  }

  pub fn from_path(path: &str) -> Result<Self, CatalogError> {
    let s = std::fs::read_to_string(path)
      .map_err(|source| CatalogError::Io { path: path.to_string(), source })?;
    Self::from_toml_str(&s)
  }

  /// Validate an in-memory puzzle list.
  pub fn from_puzzles(puzzles: Vec<Puzzle>) -> Result<Self, CatalogError> {
    let catalog = Catalog { puzzles };
    catalog.validate()?;
    Ok(catalog)
  }

  pub fn len(&self) -> usize { self.puzzles.len() }

  pub fn is_empty(&self) -> bool { self.puzzles.is_empty() }

  pub fn get(&self, index: usize) -> Option<&Puzzle> { self.puzzles.get(index) }

  pub fn puzzles(&self) -> &[Puzzle] { &self.puzzles }

  pub fn index_of(&self, id: &str) -> Option<usize> {
    self.puzzles.iter().position(|p| p.id == id)
  }

  /// Normalize any index into catalog bounds.
  pub fn wrap_index(&self, index: usize) -> usize {
    index % self.puzzles.len()
  }

  /// Same as `wrap_index`, counting negative indices back from the end.
  pub fn wrap_signed(&self, index: i64) -> usize {
    let len = i64::try_from(self.puzzles.len()).unwrap_or(i64::MAX);
    usize::try_from(index.rem_euclid(len)).unwrap_or(0)
  }

  /// Deep copy of the puzzle at `index` (wrapped), reset to its first section.
  /// The catalog entry itself is never handed out mutably.
  pub fn materialize(&self, index: usize) -> Puzzle {
    let mut puzzle = self.puzzles[self.wrap_index(index)].clone();
    puzzle.current_section_index = 0;
    for (i, section) in puzzle.sections.iter_mut().enumerate() {
      section.is_visible = i == 0;
      for slot in &mut section.slots {
        slot.filled_with_block_id = None;
        slot.is_solved = false;
        slot.is_incorrect = false;
      }
    }
    puzzle
  }

  pub fn fingerprint(&self) -> CatalogFingerprint {
    CatalogFingerprint {
      len: self.puzzles.len(),
      ids: self.puzzles.iter().map(|p| p.id.clone()).collect(),
    }
  }

  pub fn summaries(&self) -> Vec<PuzzleSummary> {
    self.puzzles
      .iter()
      .enumerate()
      .map(|(index, p)| PuzzleSummary {
        index,
        id: p.id.clone(),
        title: p.title.clone(),
        description: p.description.clone(),
        difficulty: p.difficulty.0,
        difficulty_label: p.difficulty.label(),
        section_count: p.sections.len(),
      })
      .collect()
  }

  fn validate(&self) -> Result<(), CatalogError> {
    if self.puzzles.is_empty() {
      return Err(CatalogError::Empty);
    }
    let mut seen = HashSet::new();
    for p in &self.puzzles {
      let invalid = |reason: String| CatalogError::Invalid { puzzle: p.id.clone(), reason };
      if !seen.insert(p.id.as_str()) {
        return Err(invalid("duplicate puzzle id".into()));
      }
      if !p.difficulty.is_valid() {
        return Err(invalid(format!("difficulty {} outside 1..=5", p.difficulty.0)));
      }
      if p.sections.is_empty() {
        return Err(invalid("puzzle has no sections".into()));
      }
      for s in &p.sections {
        validate_section(s).map_err(|reason| invalid(format!("section '{}': {}", s.id, reason)))?;
      }
    }
    Ok(())
  }
}

fn validate_section(s: &Section) -> Result<(), String> {
  if s.slots.is_empty() {
    return Err("no slots".into());
  }
  let mut block_ids = HashSet::new();
  for b in &s.blocks {
    if !block_ids.insert(b.id.as_str()) {
      return Err(format!("duplicate block id '{}'", b.id));
    }
  }
  let tokens = template::slot_ids(&s.code_template);
  for slot in &s.slots {
    let Some(block) = s.block(&slot.correct_block_id) else {
      return Err(format!("slot '{}' points at missing block '{}'", slot.id, slot.correct_block_id));
    };
    if block.slot_id != slot.id {
      return Err(format!("correct block '{}' targets '{}', not '{}'", block.id, block.slot_id, slot.id));
    }
    if !tokens.contains(&slot.id) {
      return Err(format!("slot '{}' has no placeholder in the template", slot.id));
    }
  }
  Ok(())
}

/// Load the catalog override if one is configured, falling back to the built-in catalog.
pub fn load_catalog(path: Option<&str>) -> Result<Catalog, CatalogError> {
  if let Some(path) = path {
    match Catalog::from_path(path) {
      Ok(c) => {
        info!(target: "codesnap_backend", %path, puzzles = c.len(), "Loaded catalog override");
        return Ok(c);
      }
      Err(e) => {
        error!(target: "codesnap_backend", %path, error = %e, "Catalog override rejected; using built-in catalog");
      }
    }
  }
  let c = Catalog::builtin()?;
  info!(target: "codesnap_backend", puzzles = c.len(), "Loaded built-in catalog");
  Ok(c)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_is_valid() {
    let c = Catalog::builtin().unwrap();
    assert_eq!(c.len(), 9);
    let bs = c.get(c.index_of("binary-search").unwrap()).unwrap();
    assert_eq!(bs.sections.len(), 4);
    assert_eq!(bs.difficulty.0, 3);
    assert!(bs.sections[0].code_template.starts_with("function binarySearch"));
  }

  #[test]
  fn builtin_has_every_band_represented() {
    let c = Catalog::builtin().unwrap();
    assert!(c.puzzles().iter().any(|p| p.difficulty.0 <= 2));
    assert!(c.puzzles().iter().any(|p| p.difficulty.0 == 5));
  }

  #[test]
  fn materialize_is_a_private_copy() {
    let c = Catalog::builtin().unwrap();
    let mut p = c.materialize(0);
    p.sections[0].slots[0].filled_with_block_id = Some("block-1".into());
    p.current_section_index = 2;
    assert!(c.get(0).unwrap().sections[0].slots[0].filled_with_block_id.is_none());
    assert_eq!(c.get(0).unwrap().current_section_index, 0);

    let fresh = c.materialize(c.len());
    assert_eq!(fresh.id, c.get(0).unwrap().id);
    assert!(fresh.sections[0].is_visible);
    assert!(fresh.sections[1..].iter().all(|s| !s.is_visible));
  }

  #[test]
  fn fingerprint_tracks_ids() {
    let c = Catalog::builtin().unwrap();
    let fp = c.fingerprint();
    assert_eq!(fp.len, c.len());
    assert_eq!(fp.ids[0], "binary-search");
  }

  const ONE: &str = r#"
[[puzzles]]
id = "p"
title = "P"
description = "d"
difficulty = 1

  [[puzzles.sections]]
  id = "s"
  title = "S"
  description = "d"
  code_template = "x = %SLOT-1%"

    [[puzzles.sections.slots]]
    id = "slot-1"
    correct_block_id = "block-1"

    [[puzzles.sections.blocks]]
    id = "block-1"
    content = "1"
    is_correct = true
    slot_id = "slot-1"
"#;

  #[test]
  fn parses_minimal_catalog() {
    let c = Catalog::from_toml_str(ONE).unwrap();
    assert_eq!(c.len(), 1);
    assert!(!c.get(0).unwrap().sections[0].blocks[0].is_decoy);
  }

  #[test]
  fn rejects_inconsistent_catalogs() {
    let missing_token = ONE.replace("x = %SLOT-1%", "x = 1");
    assert!(matches!(Catalog::from_toml_str(&missing_token), Err(CatalogError::Invalid { .. })));

    let bad_difficulty = ONE.replace("difficulty = 1", "difficulty = 9");
    assert!(matches!(Catalog::from_toml_str(&bad_difficulty), Err(CatalogError::Invalid { .. })));

    let missing_block = ONE.replace("correct_block_id = \"block-1\"", "correct_block_id = \"block-9\"");
    assert!(matches!(Catalog::from_toml_str(&missing_block), Err(CatalogError::Invalid { .. })));

    assert!(matches!(Catalog::from_toml_str("puzzles = []"), Err(CatalogError::Empty)));
    assert!(matches!(Catalog::from_toml_str("puzzles = 3"), Err(CatalogError::Parse(_))));
  }

  #[test]
  fn in_memory_puzzles_are_validated_too() {
    assert!(matches!(Catalog::from_puzzles(vec![]), Err(CatalogError::Empty)));

    let builtin = Catalog::builtin().unwrap();
    let twice: Vec<Puzzle> = builtin.puzzles().iter().chain(builtin.puzzles()).cloned().collect();
    assert!(matches!(Catalog::from_puzzles(twice), Err(CatalogError::Invalid { .. })));

    let mut unanchored = builtin.get(4).unwrap().clone();
    unanchored.sections[0].code_template = "return;".into();
    assert!(matches!(Catalog::from_puzzles(vec![unanchored]), Err(CatalogError::Invalid { .. })));

    let subset = Catalog::from_puzzles(builtin.puzzles()[..2].to_vec()).unwrap();
    assert_eq!(subset.len(), 2);
    assert_eq!(subset.wrap_index(5), 1);
    assert_eq!(subset.wrap_signed(-1), 1);
    assert_eq!(subset.wrap_signed(-4), 0);
    assert_eq!(subset.wrap_signed(3), 1);
  }
}
