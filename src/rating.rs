//! Skill rating: curves that turn a puzzle outcome into a new rating, and the
//! per-attempt lock that lets only the first outcome count.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INITIAL_ELO: u32 = 1200;
pub const DEFAULT_SUCCESS_DELTA: u32 = 10;
pub const DEFAULT_FAILURE_DELTA: u32 = 15;
pub const DEFAULT_K_FACTOR: f64 = 32.0;
/// Rating a puzzle "plays at" per difficulty step in the Elo curve.
pub const ELO_POINTS_PER_DIFFICULTY: f64 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Success,
  Failure,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RatingCurve {
  /// Flat reward / penalty.
  Fixed { success_delta: u32, failure_delta: u32 },
  /// Classic Elo against a puzzle rated `difficulty * 200`.
  Elo { k_factor: f64 },
}

impl Default for RatingCurve {
  fn default() -> Self {
    RatingCurve::Fixed { success_delta: DEFAULT_SUCCESS_DELTA, failure_delta: DEFAULT_FAILURE_DELTA }
  }
}

impl RatingCurve {
  /// New rating after `outcome`. Never below zero.
  pub fn apply(&self, elo: u32, difficulty: u8, outcome: Outcome) -> u32 {
    match *self {
      RatingCurve::Fixed { success_delta, failure_delta } => match outcome {
        Outcome::Success => elo.saturating_add(success_delta),
        Outcome::Failure => elo.saturating_sub(failure_delta),
      },
      RatingCurve::Elo { k_factor } => {
        let puzzle_rating = f64::from(difficulty) * ELO_POINTS_PER_DIFFICULTY;
        let expected = 1.0 / (1.0 + 10f64.powf((puzzle_rating - f64::from(elo)) / 400.0));
        let actual = match outcome {
          Outcome::Success => 1.0,
          Outcome::Failure => 0.0,
        };
        let next = (f64::from(elo) + k_factor * (actual - expected)).round();
        next.clamp(0.0, f64::from(u32::MAX)) as u32
      }
    }
  }
}

/// A rating change that was applied (or deliberately skipped) for an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RatingChange {
  pub outcome: Outcome,
  pub before: u32,
  pub after: u32,
}

impl RatingChange {
  pub fn delta(&self) -> i64 { i64::from(self.after) - i64::from(self.before) }
}

/// Remembers the first outcome of a puzzle attempt. Later outcomes are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptRating {
  locked: Option<RatingChange>,
}

impl AttemptRating {
  pub fn locked(&self) -> Option<RatingChange> { self.locked }

  pub fn is_locked(&self) -> bool { self.locked.is_some() }

  /// Apply `outcome` to `elo` if this attempt has no outcome yet.
  /// `pinned` (developer override) replaces the curve entirely.
  /// Returns the change when this call decided it, None when already locked.
  pub fn settle(
    &mut self,
    elo: &mut u32,
    curve: &RatingCurve,
    difficulty: u8,
    outcome: Outcome,
    pinned: Option<u32>,
  ) -> Option<RatingChange> {
    if self.locked.is_some() {
      return None;
    }
    let before = *elo;
    let after = match pinned {
      Some(value) => value,
      None => curve.apply(before, difficulty, outcome),
    };
    *elo = after;
    let change = RatingChange { outcome, before, after };
    self.locked = Some(change);
    Some(change)
  }

  /// Lock the attempt without touching the rating (forced-correct debug runs).
  pub fn settle_unrated(&mut self, elo: u32, outcome: Outcome) -> Option<RatingChange> {
    if self.locked.is_some() {
      return None;
    }
    let change = RatingChange { outcome, before: elo, after: elo };
    self.locked = Some(change);
    Some(change)
  }
}
