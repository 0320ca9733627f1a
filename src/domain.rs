//! Domain models: blocks, slots, sections, puzzles and the player's progress.

use serde::{Deserialize, Serialize};

/// A draggable code fragment. Exactly one block per slot is correct; the rest are decoys.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
  pub id: String,
  pub content: String,
  #[serde(default)] pub is_correct: bool,
  #[serde(default)] pub is_decoy: bool,
  /// Slot this block was written for (decoys included).
  pub slot_id: String,
}

/// A blank inside a section's code template.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
  pub id: String,
  pub correct_block_id: String,
  #[serde(default)] pub filled_with_block_id: Option<String>,
  #[serde(default)] pub is_solved: bool,
  #[serde(default)] pub is_incorrect: bool,
}

impl Slot {
  pub fn is_empty(&self) -> bool { self.filled_with_block_id.is_none() }

  /// True only when filled with the correct block. An empty slot never matches.
  pub fn holds_correct_block(&self) -> bool {
    self.filled_with_block_id.as_deref() == Some(self.correct_block_id.as_str())
  }
}

/// One progressive step of a puzzle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
  pub id: String,
  pub title: String,
  pub description: String,
  /// Code with `%SLOT-n%` placeholders, one per slot.
  pub code_template: String,
  pub slots: Vec<Slot>,
  pub blocks: Vec<Block>,
  #[serde(default)] pub is_visible: bool,
}

impl Section {
  pub fn block(&self, id: &str) -> Option<&Block> {
    self.blocks.iter().find(|b| b.id == id)
  }

  pub fn slot(&self, id: &str) -> Option<&Slot> {
    self.slots.iter().find(|s| s.id == id)
  }

  pub fn is_solved(&self) -> bool {
    self.slots.iter().all(Slot::holds_correct_block)
  }
}

/// Puzzle difficulty on a 1-5 scale.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Difficulty(pub u8);

impl Difficulty {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn is_valid(self) -> bool { (Self::MIN..=Self::MAX).contains(&self.0) }

  pub fn label(self) -> &'static str {
    match self.0 {
      0..=2 => "Easy",
      3..=4 => "Medium",
      _ => "Hard",
    }
  }
}

/// A puzzle as stored in the catalog, or as a private working copy owned by the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Puzzle {
  pub id: String,
  pub title: String,
  pub description: String,
  pub difficulty: Difficulty,
  pub sections: Vec<Section>,
  #[serde(default)] pub current_section_index: usize,
}

impl Puzzle {
  pub fn current_section(&self) -> &Section {
    &self.sections[self.current_section_index]
  }

  pub fn is_final_section(&self) -> bool {
    self.current_section_index + 1 >= self.sections.len()
  }
}

/// Persistent player progress.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProgress {
  pub elo: u32,
  #[serde(default)] pub solved_puzzles: Vec<String>,
  #[serde(default)] pub current_puzzle_index: usize,
}

impl UserProgress {
  pub fn new(initial_elo: u32) -> Self {
    Self { elo: initial_elo, solved_puzzles: Vec::new(), current_puzzle_index: 0 }
  }

  /// Append to the solved history unless already present. Returns true when newly recorded.
  pub fn record_solved(&mut self, puzzle_id: &str) -> bool {
    if self.has_solved(puzzle_id) {
      return false;
    }
    self.solved_puzzles.push(puzzle_id.to_string());
    true
  }

  pub fn has_solved(&self, puzzle_id: &str) -> bool {
    self.solved_puzzles.iter().any(|id| id == puzzle_id)
  }
}

impl Default for UserProgress {
  fn default() -> Self { Self::new(crate::rating::DEFAULT_INITIAL_ELO) }
}

/// Debug overrides from the developer panel. Not part of normal gameplay.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeveloperSettings {
  #[serde(default)] pub force_correct: bool,
  #[serde(default)] pub custom_elo: Option<u32>,
}

/// Partial update for `DeveloperSettings`; absent fields stay unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DeveloperSettingsPatch {
  #[serde(default, rename = "forceCorrect")] pub force_correct: Option<bool>,
  /// `Some(None)` clears a pinned rating.
  #[serde(default, rename = "customElo", deserialize_with = "double_option")]
  pub custom_elo: Option<Option<u32>>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<u32>>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Option::<u32>::deserialize(de).map(Some)
}
