//! Next-puzzle selection: walk the catalog in order, or draw at random from the
//! difficulty band that matches the player's rating.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::EngineError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Sequential,
    RatingBanded,
}

/// Ratings at or above `min_elo` (up to the next band) may draw puzzles in
/// `min_difficulty..=max_difficulty`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBand {
    pub min_elo: u32,
    pub min_difficulty: u8,
    pub max_difficulty: u8,
}

impl RatingBand {
    pub fn difficulties(&self) -> RangeInclusive<u8> {
        self.min_difficulty..=self.max_difficulty
    }
}

/// Beginner: easy only. Intermediate: easy and medium. Expert: hard only.
pub fn default_bands() -> Vec<RatingBand> {
    vec![
        RatingBand { min_elo: 0, min_difficulty: 1, max_difficulty: 2 },
        RatingBand { min_elo: 1000, min_difficulty: 1, max_difficulty: 4 },
        RatingBand { min_elo: 1600, min_difficulty: 5, max_difficulty: 5 },
    ]
}

/// Band for `elo`: the one with the highest `min_elo` not above it.
/// Ratings below every band use the lowest band.
pub fn band_for(bands: &[RatingBand], elo: u32) -> RatingBand {
    bands
        .iter()
        .filter(|b| b.min_elo <= elo)
        .max_by_key(|b| b.min_elo)
        .or_else(|| bands.iter().min_by_key(|b| b.min_elo))
        .copied()
        .unwrap_or(RatingBand { min_elo: 0, min_difficulty: 1, max_difficulty: 5 })
}

pub fn next_sequential(current: usize, catalog_len: usize) -> usize {
    (current + 1) % catalog_len
}

/// Catalog indices whose difficulty lies in `band`.
pub fn eligible(catalog: &Catalog, band: &RatingBand) -> Vec<usize> {
    catalog
        .puzzles()
        .iter()
        .enumerate()
        .filter(|(_, p)| band.difficulties().contains(&p.difficulty.0))
        .map(|(i, _)| i)
        .collect()
}

/// Uniform pick among the puzzles in the rating's band.
pub fn pick_banded<R: Rng + ?Sized>(
    catalog: &Catalog,
    bands: &[RatingBand],
    elo: u32,
    rng: &mut R,
) -> Result<usize, EngineError> {
    let band = band_for(bands, elo);
    let candidates = eligible(catalog, &band);
    if candidates.is_empty() {
        return Err(EngineError::NoEligiblePuzzle {
            elo,
            min_difficulty: band.min_difficulty,
            max_difficulty: band.max_difficulty,
        });
    }
    Ok(candidates[rng.gen_range(0..candidates.len())])
}
