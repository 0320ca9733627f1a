//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! The front-end renders everything from `SnapshotOut`; it never sees which block is correct.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::PuzzleSummary;
use crate::domain::{DeveloperSettings, DeveloperSettingsPatch};
use crate::engine::{AttemptPhase, ProgressionEngine, Verdict};
use crate::rating::RatingChange;
use crate::solver::SectionBoard;
use crate::template::{self, Segment};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    ListPuzzles,
    /// Any integer; wrapped into the catalog (negative counts from the end).
    LoadPuzzle {
        index: i64,
    },
    NextPuzzle,
    PlaceBlock {
        #[serde(rename = "blockId")]
        block_id: String,
        #[serde(rename = "slotId")]
        slot_id: String,
    },
    ClearSlot {
        #[serde(rename = "slotId")]
        slot_id: String,
    },
    Submit,
    ResetSection,
    Retry,
    Skip,
    ResetProgress,
    UpdateDeveloper {
        #[serde(flatten)]
        patch: DeveloperSettingsPatch,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        state: SnapshotOut,
    },
    Puzzles {
        puzzles: Vec<PuzzleListItem>,
    },
    Action {
        applied: bool,
        state: SnapshotOut,
    },
    SubmitResult {
        verdict: VerdictOut,
        feedback: Option<FeedbackOut>,
        state: SnapshotOut,
    },
    Error {
        message: String,
    },
}

/// Everything the UI needs to draw the current screen.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotOut {
    pub progress: ProgressOut,
    pub developer: DeveloperSettings,
    pub puzzle: Option<PuzzleOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressOut {
    pub elo: u32,
    pub solved_puzzles: Vec<String>,
    pub current_puzzle_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PuzzleOut {
    pub attempt_id: Uuid,
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: u8,
    pub difficulty_label: &'static str,
    pub section_index: usize,
    pub section_count: usize,
    pub phase: AttemptPhase,
    pub is_complete: bool,
    pub can_submit: bool,
    pub rating_change: Option<RatingChange>,
    pub section: SectionOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub segments: Vec<SegmentOut>,
    pub available_blocks: Vec<BlockOut>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentOut {
    Code {
        text: String,
    },
    Slot {
        slot_id: String,
        filled: Option<BlockOut>,
        is_incorrect: bool,
        is_solved: bool,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockOut {
    pub id: String,
    pub content: String,
}

/// Row of the puzzle picker.
#[derive(Debug, Clone, Serialize)]
pub struct PuzzleListItem {
    #[serde(flatten)]
    pub summary: PuzzleSummary,
    pub solved: bool,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerdictOut {
    Ignored,
    Incomplete,
    SectionSolved {
        section_index: usize,
    },
    PuzzleSolved {
        rating: Option<RatingChange>,
    },
    Incorrect {
        incorrect_slots: Vec<String>,
        rating: Option<RatingChange>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Retry,
    NextPuzzle,
}

/// Audio/visual cue the front-end may play. Nothing is expected back.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackOut {
    pub kind: FeedbackKind,
    pub message: String,
    pub choices: Vec<Choice>,
    pub cue: Cue,
}

pub fn snapshot(engine: &ProgressionEngine) -> SnapshotOut {
    let progress = engine.progress();
    let puzzle = engine.attempt().map(|a| {
        let p = a.puzzle();
        let board = a.board();
        let section = board.section();
        PuzzleOut {
            attempt_id: a.id(),
            id: p.id.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            difficulty: p.difficulty.0,
            difficulty_label: p.difficulty.label(),
            section_index: p.current_section_index,
            section_count: p.sections.len(),
            phase: a.phase(),
            is_complete: a.is_complete(),
            can_submit: engine.can_submit(),
            rating_change: a.rating_change(),
            section: SectionOut {
                id: section.id.clone(),
                title: section.title.clone(),
                description: section.description.clone(),
                segments: render_segments(board),
                available_blocks: board
                    .available()
                    .iter()
                    .map(|b| BlockOut { id: b.id.clone(), content: b.content.clone() })
                    .collect(),
            },
        }
    });

    SnapshotOut {
        progress: ProgressOut {
            elo: progress.elo,
            solved_puzzles: progress.solved_puzzles.clone(),
            current_puzzle_index: progress.current_puzzle_index,
        },
        developer: engine.developer().clone(),
        puzzle,
    }
}

/// Bind template placeholders to live slot state. Placeholders without a slot stay literal.
pub fn render_segments(board: &SectionBoard) -> Vec<SegmentOut> {
    template::segments(&board.section().code_template)
        .into_iter()
        .map(|seg| match seg {
            Segment::Code { text } => SegmentOut::Code { text },
            Segment::Slot { slot_id } => match board.slots().iter().find(|s| s.id == slot_id) {
                Some(slot) => SegmentOut::Slot {
                    filled: board
                        .filled_block(slot)
                        .map(|b| BlockOut { id: b.id.clone(), content: b.content.clone() }),
                    is_incorrect: slot.is_incorrect,
                    is_solved: slot.is_solved,
                    slot_id,
                },
                None => SegmentOut::Code {
                    text: format!("%SLOT-{}%", slot_id.trim_start_matches("slot-")),
                },
            },
        })
        .collect()
}

pub fn puzzle_list(engine: &ProgressionEngine) -> Vec<PuzzleListItem> {
    let progress = engine.progress();
    engine
        .catalog()
        .summaries()
        .into_iter()
        .map(|summary| PuzzleListItem {
            solved: progress.has_solved(&summary.id),
            current: summary.index == progress.current_puzzle_index,
            summary,
        })
        .collect()
}

pub fn verdict_out(verdict: &Verdict) -> VerdictOut {
    match verdict {
        Verdict::Ignored => VerdictOut::Ignored,
        Verdict::Incomplete => VerdictOut::Incomplete,
        Verdict::SectionSolved { section_index, .. } => VerdictOut::SectionSolved { section_index: *section_index },
        Verdict::PuzzleSolved { rating, .. } => VerdictOut::PuzzleSolved { rating: *rating },
        Verdict::Incorrect { incorrect_slots, rating } => VerdictOut::Incorrect {
            incorrect_slots: incorrect_slots.clone(),
            rating: *rating,
        },
    }
}

/// What the notification sink should show for a verdict.
pub fn feedback_for(verdict: &Verdict) -> Option<FeedbackOut> {
    match verdict {
        Verdict::Ignored | Verdict::Incomplete => None,
        Verdict::SectionSolved { .. } => Some(FeedbackOut {
            kind: FeedbackKind::Success,
            message: "Great job! That's correct.".into(),
            choices: vec![],
            cue: Cue::Success,
        }),
        Verdict::PuzzleSolved { .. } => Some(FeedbackOut {
            kind: FeedbackKind::Success,
            message: "Puzzle solved! Loading the next one...".into(),
            choices: vec![],
            cue: Cue::Success,
        }),
        Verdict::Incorrect { .. } => Some(FeedbackOut {
            kind: FeedbackKind::Error,
            message: "That's not quite right. Try again or move on to the next puzzle.".into(),
            choices: vec![Choice::Retry, Choice::NextPuzzle],
            cue: Cue::Failure,
        }),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LoadIn {
    pub index: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceIn {
    #[serde(rename = "blockId")]
    pub block_id: String,
    #[serde(rename = "slotId")]
    pub slot_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearIn {
    #[serde(rename = "slotId")]
    pub slot_id: String,
}

#[derive(Serialize)]
pub struct ActionOut {
    pub applied: bool,
    pub state: SnapshotOut,
}

#[derive(Serialize)]
pub struct SubmitOut {
    pub verdict: VerdictOut,
    pub feedback: Option<FeedbackOut>,
    pub state: SnapshotOut,
}

#[derive(Serialize)]
pub struct PuzzlesOut {
    pub puzzles: Vec<PuzzleListItem>,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
