//! Progression & rating engine.
//!
//! Owns the player's progress, the developer overrides and the active puzzle
//! attempt (a private copy of a catalog entry). All mutation goes through the
//! methods here; the engine is synchronous and single-writer.
//!
//! Pacing pauses are modelled as `PendingTransition`s: the engine hands back a
//! token and the caller applies it after the delay. Any state change that
//! would make the transition meaningless bumps the generation counter, so a
//! late token is recognised as stale and ignored.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::domain::{DeveloperSettings, DeveloperSettingsPatch, Puzzle, UserProgress};
use crate::error::EngineError;
use crate::rating::{AttemptRating, Outcome, RatingChange, RatingCurve, DEFAULT_INITIAL_ELO};
use crate::selection::{self, default_bands, RatingBand, SelectionMode};
use crate::solver::SectionBoard;

/// Tunables taken from `AppConfig`.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub initial_elo: u32,
    pub curve: RatingCurve,
    pub mode: SelectionMode,
    pub bands: Vec<RatingBand>,
    pub section_advance: Duration,
    pub puzzle_advance: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_elo: DEFAULT_INITIAL_ELO,
            curve: RatingCurve::default(),
            mode: SelectionMode::Sequential,
            bands: default_bands(),
            section_advance: Duration::from_millis(800),
            puzzle_advance: Duration::from_millis(800),
        }
    }
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            initial_elo: cfg.rating.initial_elo,
            curve: cfg.rating.curve(),
            mode: cfg.selection.mode,
            bands: cfg.selection.bands.clone(),
            section_advance: Duration::from_millis(cfg.pacing.section_advance_ms),
            puzzle_advance: Duration::from_millis(cfg.pacing.puzzle_advance_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// Player is filling slots.
    AwaitingInput,
    /// Section solved; waiting for the advance transition.
    Advancing,
    /// Submission was wrong; waiting for the player to retry or skip.
    Incorrect,
    /// Last section solved; waiting for the next-puzzle transition.
    PuzzleComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionToken {
    pub attempt_id: Uuid,
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    AdvanceSection,
    LoadNextPuzzle,
}

/// A deferred state change the caller should apply after `delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransition {
    pub token: TransitionToken,
    pub kind: TransitionKind,
    pub delay: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// No puzzle loaded, or the attempt is not accepting input.
    Ignored,
    /// At least one slot is still empty.
    Incomplete,
    SectionSolved {
        section_index: usize,
        next: PendingTransition,
    },
    PuzzleSolved {
        rating: Option<RatingChange>,
        next: PendingTransition,
    },
    Incorrect {
        incorrect_slots: Vec<String>,
        rating: Option<RatingChange>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    Applied(TransitionKind),
    Stale,
}

/// One load of one puzzle. The rating changes at most once per attempt.
#[derive(Clone, Debug)]
pub struct Attempt {
    id: Uuid,
    puzzle: Puzzle,
    board: SectionBoard,
    phase: AttemptPhase,
    rating: AttemptRating,
}

impl Attempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn board(&self) -> &SectionBoard {
        &self.board
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn rating_change(&self) -> Option<RatingChange> {
        self.rating.locked()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == AttemptPhase::PuzzleComplete
    }
}

pub struct ProgressionEngine {
    catalog: Arc<Catalog>,
    settings: EngineSettings,
    progress: UserProgress,
    developer: DeveloperSettings,
    attempt: Option<Attempt>,
    generation: u64,
    rng: StdRng,
}

impl ProgressionEngine {
    pub fn new(catalog: Arc<Catalog>, settings: EngineSettings) -> Self {
        let progress = UserProgress::new(settings.initial_elo);
        Self::restore(catalog, settings, progress, DeveloperSettings::default())
    }

    /// Resume from saved progress. No puzzle is loaded until `load_puzzle`.
    pub fn restore(
        catalog: Arc<Catalog>,
        settings: EngineSettings,
        mut progress: UserProgress,
        developer: DeveloperSettings,
    ) -> Self {
        progress.current_puzzle_index = catalog.wrap_index(progress.current_puzzle_index);
        Self {
            catalog,
            settings,
            progress,
            developer,
            attempt: None,
            generation: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic shuffles and picks.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn developer(&self) -> &DeveloperSettings {
        &self.developer
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn phase(&self) -> Option<AttemptPhase> {
        self.attempt.as_ref().map(|a| a.phase)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Submission is allowed exactly when input is accepted and no slot is empty.
    pub fn can_submit(&self) -> bool {
        self.attempt
            .as_ref()
            .map(|a| a.phase == AttemptPhase::AwaitingInput && a.board.all_filled())
            .unwrap_or(false)
    }

    // -------- Loading --------

    /// Load the puzzle at the saved index.
    pub fn load_puzzle(&mut self) -> usize {
        self.load_by_index(self.progress.current_puzzle_index)
    }

    /// Load any index; out-of-range values wrap into the catalog.
    pub fn load_by_index(&mut self, index: usize) -> usize {
        let index = self.catalog.wrap_index(index);
        let puzzle = self.catalog.materialize(index);
        let board = SectionBoard::present(puzzle.current_section(), &mut self.rng);
        let id = Uuid::new_v4();

        self.generation += 1;
        self.progress.current_puzzle_index = index;
        info!(
            target: "puzzle",
            puzzle = %puzzle.id,
            index,
            difficulty = puzzle.difficulty.0,
            sections = puzzle.sections.len(),
            attempt = %id,
            "Puzzle loaded"
        );
        self.attempt = Some(Attempt {
            id,
            puzzle,
            board,
            phase: AttemptPhase::AwaitingInput,
            rating: AttemptRating::default(),
        });
        index
    }

    /// Apply the configured selection policy.
    pub fn load_next(&mut self) -> Result<usize, EngineError> {
        let next = match self.settings.mode {
            SelectionMode::Sequential => {
                selection::next_sequential(self.progress.current_puzzle_index, self.catalog.len())
            }
            SelectionMode::RatingBanded => {
                match selection::pick_banded(&self.catalog, &self.settings.bands, self.progress.elo, &mut self.rng) {
                    Ok(i) => i,
                    Err(e) => {
                        warn!(target: "puzzle", elo = self.progress.elo, error = %e, "Rating-banded selection found nothing");
                        return Err(e);
                    }
                }
            }
        };
        Ok(self.load_by_index(next))
    }

    /// Next puzzle in catalog order, regardless of the configured mode.
    pub fn load_next_sequential(&mut self) -> usize {
        let next = selection::next_sequential(self.progress.current_puzzle_index, self.catalog.len());
        self.load_by_index(next)
    }

    // -------- Slot filling --------

    pub fn place_block(&mut self, block_id: &str, slot_id: &str) -> bool {
        let Some(attempt) = self.accepting_input() else {
            return false;
        };
        let placed = attempt.board.place_block(block_id, slot_id);
        debug!(target: "puzzle", %block_id, %slot_id, placed, "place_block");
        placed
    }

    pub fn clear_slot(&mut self, slot_id: &str) -> Option<String> {
        let attempt = self.accepting_input()?;
        let cleared = attempt.board.clear_slot(slot_id);
        debug!(target: "puzzle", %slot_id, cleared = ?cleared, "clear_slot");
        cleared
    }

    fn accepting_input(&mut self) -> Option<&mut Attempt> {
        self.attempt
            .as_mut()
            .filter(|a| a.phase == AttemptPhase::AwaitingInput)
    }

    // -------- Submission --------

    pub fn submit(&mut self) -> Verdict {
        let Some(attempt) = self.attempt.as_mut() else {
            return Verdict::Ignored;
        };
        if attempt.phase != AttemptPhase::AwaitingInput {
            return Verdict::Ignored;
        }
        let forced = self.developer.force_correct;
        if !forced && !attempt.board.all_filled() {
            return Verdict::Incomplete;
        }

        let evaluation = attempt.board.evaluate();
        let token = TransitionToken { attempt_id: attempt.id, generation: self.generation };
        let section_index = attempt.puzzle.current_section_index;
        let difficulty = attempt.puzzle.difficulty.0;

        if forced || evaluation.correct {
            attempt.board.mark_solved();
            attempt.puzzle.sections[section_index].slots = attempt.board.slots().to_vec();

            if !attempt.puzzle.is_final_section() {
                attempt.phase = AttemptPhase::Advancing;
                info!(target: "puzzle", puzzle = %attempt.puzzle.id, section = section_index, forced, "Section solved");
                return Verdict::SectionSolved {
                    section_index,
                    next: PendingTransition {
                        token,
                        kind: TransitionKind::AdvanceSection,
                        delay: self.settings.section_advance,
                    },
                };
            }

            attempt.phase = AttemptPhase::PuzzleComplete;
            self.progress.record_solved(&attempt.puzzle.id);
            let rating = if forced {
                attempt.rating.settle_unrated(self.progress.elo, Outcome::Success)
            } else {
                attempt.rating.settle(
                    &mut self.progress.elo,
                    &self.settings.curve,
                    difficulty,
                    Outcome::Success,
                    self.developer.custom_elo,
                )
            };
            info!(
                target: "puzzle",
                puzzle = %attempt.puzzle.id,
                elo = self.progress.elo,
                rated = rating.is_some(),
                forced,
                "Puzzle complete"
            );
            return Verdict::PuzzleSolved {
                rating,
                next: PendingTransition {
                    token,
                    kind: TransitionKind::LoadNextPuzzle,
                    delay: self.settings.puzzle_advance,
                },
            };
        }

        attempt.board.mark_incorrect(&evaluation);
        attempt.phase = AttemptPhase::Incorrect;
        let rating = attempt.rating.settle(
            &mut self.progress.elo,
            &self.settings.curve,
            difficulty,
            Outcome::Failure,
            self.developer.custom_elo,
        );
        let incorrect_slots = evaluation.incorrect_slots();
        info!(
            target: "puzzle",
            puzzle = %attempt.puzzle.id,
            section = section_index,
            incorrect = ?incorrect_slots,
            elo = self.progress.elo,
            rated = rating.is_some(),
            "Incorrect submission"
        );
        Verdict::Incorrect { incorrect_slots, rating }
    }

    // -------- Player choices --------

    /// Clear every slot and reshuffle the current section. Allowed while
    /// filling slots and after a wrong answer; never changes the rating.
    pub fn reset_section(&mut self) -> bool {
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };
        if !matches!(attempt.phase, AttemptPhase::AwaitingInput | AttemptPhase::Incorrect) {
            return false;
        }
        attempt.board.reset(&mut self.rng);
        attempt.phase = AttemptPhase::AwaitingInput;
        self.generation += 1;
        debug!(target: "puzzle", puzzle = %attempt.puzzle.id, section = attempt.puzzle.current_section_index, "Section reset");
        true
    }

    /// After a wrong answer: try the same section again.
    pub fn retry(&mut self) -> bool {
        if self.phase() != Some(AttemptPhase::Incorrect) {
            return false;
        }
        self.reset_section()
    }

    /// Give up on the current puzzle and move on. Counts as a failure if the
    /// attempt has no outcome yet; otherwise the rating is left alone.
    pub fn skip(&mut self) -> Result<usize, EngineError> {
        let attempt = self.attempt.as_mut().ok_or(EngineError::NoActivePuzzle)?;
        let rating = attempt.rating.settle(
            &mut self.progress.elo,
            &self.settings.curve,
            attempt.puzzle.difficulty.0,
            Outcome::Failure,
            self.developer.custom_elo,
        );
        info!(target: "puzzle", puzzle = %attempt.puzzle.id, rated = rating.is_some(), elo = self.progress.elo, "Puzzle skipped");
        self.load_next()
    }

    // -------- Deferred transitions --------

    pub fn apply_transition(&mut self, token: TransitionToken) -> Result<TransitionResult, EngineError> {
        let Some(attempt) = self.attempt.as_mut() else {
            return Ok(TransitionResult::Stale);
        };
        if token.attempt_id != attempt.id || token.generation != self.generation {
            debug!(target: "puzzle", ?token, current_generation = self.generation, "Stale transition ignored");
            return Ok(TransitionResult::Stale);
        }

        let phase = attempt.phase;
        match phase {
            AttemptPhase::Advancing => {
                let next = attempt.puzzle.current_section_index + 1;
                attempt.puzzle.current_section_index = next;
                attempt.puzzle.sections[next].is_visible = true;
                attempt.board = SectionBoard::present(&attempt.puzzle.sections[next], &mut self.rng);
                attempt.phase = AttemptPhase::AwaitingInput;
                self.generation += 1;
                info!(target: "puzzle", puzzle = %attempt.puzzle.id, section = next, "Advanced to next section");
                Ok(TransitionResult::Applied(TransitionKind::AdvanceSection))
            }
            AttemptPhase::PuzzleComplete => {
                self.load_next()?;
                Ok(TransitionResult::Applied(TransitionKind::LoadNextPuzzle))
            }
            AttemptPhase::AwaitingInput | AttemptPhase::Incorrect => Ok(TransitionResult::Stale),
        }
    }

    // -------- Progress & developer overrides --------

    /// Back to the initial rating, empty history and the first puzzle.
    pub fn reset_all_progress(&mut self) -> usize {
        self.progress = UserProgress::new(self.developer.custom_elo.unwrap_or(self.settings.initial_elo));
        info!(target: "puzzle", elo = self.progress.elo, "Progress reset");
        self.load_by_index(0)
    }

    pub fn update_developer_settings(&mut self, patch: DeveloperSettingsPatch) -> &DeveloperSettings {
        if let Some(force) = patch.force_correct {
            self.developer.force_correct = force;
        }
        if let Some(custom) = patch.custom_elo {
            self.developer.custom_elo = custom;
            if let Some(elo) = custom {
                self.progress.elo = elo;
            }
        }
        warn!(
            target: "puzzle",
            force_correct = self.developer.force_correct,
            custom_elo = ?self.developer.custom_elo,
            "Developer settings changed"
        );
        &self.developer
    }
}
