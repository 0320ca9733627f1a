//! End-to-end progression scenarios against the built-in catalog.

use std::sync::Arc;
use std::time::Duration;

use codesnap_backend::catalog::Catalog;
use codesnap_backend::domain::{DeveloperSettings, UserProgress};
use codesnap_backend::engine::{
    AttemptPhase, EngineSettings, ProgressionEngine, TransitionKind, TransitionResult, Verdict,
};
use codesnap_backend::error::EngineError;
use codesnap_backend::logic;
use codesnap_backend::persistence::MemoryStore;
use codesnap_backend::protocol::ServerWsMessage;
use codesnap_backend::rating::Outcome;
use codesnap_backend::selection::{RatingBand, SelectionMode};
use codesnap_backend::state::AppState;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().unwrap())
}

fn engine() -> ProgressionEngine {
    ProgressionEngine::new(catalog(), EngineSettings::default()).with_seed(7)
}

fn fill_correct(e: &mut ProgressionEngine) {
    let slots = e.attempt().unwrap().board().slots().to_vec();
    for s in slots {
        assert!(e.place_block(&s.correct_block_id, &s.id), "placing {} into {}", s.correct_block_id, s.id);
    }
}

fn fill_with_decoy(e: &mut ProgressionEngine) {
    let section = e.attempt().unwrap().board().section().clone();
    let first = &section.slots[0];
    let decoy = section
        .blocks
        .iter()
        .find(|b| b.is_decoy && b.slot_id == first.id)
        .unwrap();
    assert!(e.place_block(&decoy.id, &first.id));
    for s in &section.slots[1..] {
        assert!(e.place_block(&s.correct_block_id, &s.id));
    }
}

/// The current section is presented with empty slots and its whole block set.
fn assert_fresh_section(e: &ProgressionEngine) {
    let attempt = e.attempt().unwrap();
    let index = attempt.puzzle().current_section_index;
    let section = &attempt.puzzle().sections[index];
    let board = attempt.board();

    assert!(section.is_visible);
    assert_eq!(attempt.phase(), AttemptPhase::AwaitingInput);
    assert!(board.slots().iter().all(|s| s.is_empty() && !s.is_incorrect && !s.is_solved));
    assert_eq!(board.available().len(), section.blocks.len());

    let mut pool: Vec<&str> = board.available().iter().map(|b| b.id.as_str()).collect();
    let mut blocks: Vec<&str> = section.blocks.iter().map(|b| b.id.as_str()).collect();
    pool.sort_unstable();
    blocks.sort_unstable();
    assert_eq!(pool, blocks);
}

/// Solve every section of the current puzzle, applying each advance.
fn solve_current(e: &mut ProgressionEngine) -> Verdict {
    loop {
        fill_correct(e);
        match e.submit() {
            Verdict::SectionSolved { next, .. } => {
                assert_eq!(
                    e.apply_transition(next.token),
                    Ok(TransitionResult::Applied(TransitionKind::AdvanceSection))
                );
                assert_fresh_section(e);
            }
            other => return other,
        }
    }
}

#[test]
fn binary_search_walkthrough() {
    let mut e = engine();
    e.load_by_index(0);
    assert_eq!(e.attempt().unwrap().puzzle().id, "binary-search");
    assert_eq!(e.attempt().unwrap().puzzle().sections.len(), 4);
    assert_fresh_section(&e);

    let Verdict::PuzzleSolved { rating, next } = solve_current(&mut e) else {
        panic!("expected the puzzle to be solved");
    };
    let change = rating.unwrap();
    assert_eq!(change.outcome, Outcome::Success);
    assert_eq!((change.before, change.after), (1200, 1210));
    assert!(e.progress().has_solved("binary-search"));
    assert!(e.attempt().unwrap().is_complete());
    assert!(e
        .attempt()
        .unwrap()
        .puzzle()
        .sections
        .iter()
        .all(|s| s.is_visible && s.is_solved()));

    assert_eq!(next.kind, TransitionKind::LoadNextPuzzle);
    assert_eq!(
        e.apply_transition(next.token),
        Ok(TransitionResult::Applied(TransitionKind::LoadNextPuzzle))
    );
    assert_eq!(e.progress().current_puzzle_index, 1);
    assert_eq!(e.attempt().unwrap().puzzle().id, "lcs");
}

#[test]
fn decoy_then_retry_then_skip() {
    let mut e = engine();
    e.load_by_index(2);
    fill_with_decoy(&mut e);
    let Verdict::Incorrect { incorrect_slots, .. } = e.submit() else { panic!() };
    assert_eq!(incorrect_slots, vec!["slot-1".to_string()]);
    assert_eq!(e.progress().elo, 1185);

    assert!(e.retry());
    assert_eq!(e.phase(), Some(AttemptPhase::AwaitingInput));

    // The failure is already recorded for this attempt; skipping adds nothing.
    assert_eq!(e.skip(), Ok(3));
    assert_eq!(e.progress().elo, 1185);
    assert!(!e.progress().has_solved("bubble-sort"));
}

#[test]
fn first_failure_locks_the_rating_for_the_attempt() {
    let mut e = engine();
    e.load_by_index(0);
    fill_with_decoy(&mut e);
    e.submit();
    assert_eq!(e.progress().elo, 1185);
    assert!(e.retry());

    let Verdict::PuzzleSolved { rating, .. } = solve_current(&mut e) else { panic!() };
    assert_eq!(rating, None);
    assert_eq!(e.progress().elo, 1185);
    assert!(e.progress().has_solved("binary-search"));
    assert_eq!(e.attempt().unwrap().rating_change().map(|r| r.outcome), Some(Outcome::Failure));
}

#[test]
fn sequential_selection_cycles_through_the_catalog() {
    let mut e = engine();
    e.load_puzzle();
    let len = e.catalog().len();
    let mut seen = vec![e.progress().current_puzzle_index];
    for _ in 0..len {
        seen.push(e.skip().unwrap());
    }
    let expected: Vec<usize> = (0..len).chain(std::iter::once(0)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn banded_selection_respects_the_rating() {
    let settings = EngineSettings { mode: SelectionMode::RatingBanded, ..EngineSettings::default() };
    let progress = UserProgress { elo: 400, solved_puzzles: vec![], current_puzzle_index: 0 };
    let mut e = ProgressionEngine::restore(catalog(), settings, progress, DeveloperSettings::default()).with_seed(3);
    e.load_puzzle();
    for _ in 0..20 {
        // Pin the rating so skips keep us in the beginner band.
        e.update_developer_settings(codesnap_backend::domain::DeveloperSettingsPatch {
            force_correct: None,
            custom_elo: Some(Some(400)),
        });
        let index = e.skip().unwrap();
        let difficulty = e.catalog().get(index).unwrap().difficulty.0;
        assert!(difficulty <= 2, "picked difficulty {difficulty} at elo 400");
    }
}

#[test]
fn empty_band_is_reported() {
    let settings = EngineSettings {
        mode: SelectionMode::RatingBanded,
        bands: vec![RatingBand { min_elo: 0, min_difficulty: 4, max_difficulty: 4 }],
        ..EngineSettings::default()
    };
    let mut e = ProgressionEngine::new(catalog(), settings);
    e.load_puzzle();
    assert!(matches!(e.load_next(), Err(EngineError::NoEligiblePuzzle { .. })));
    assert_eq!(e.attempt().unwrap().puzzle().id, "binary-search");
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        section_advance: Duration::from_millis(20),
        puzzle_advance: Duration::from_millis(20),
        ..EngineSettings::default()
    }
}

async fn fill_correct_via_service(state: &AppState) {
    let slots = {
        let engine = state.engine.lock().await;
        engine.attempt().unwrap().board().slots().to_vec()
    };
    for s in slots {
        assert!(logic::place_block(state, &s.correct_block_id, &s.id).await.applied);
    }
}

#[tokio::test]
async fn deferred_section_advance_is_pushed() {
    let state = Arc::new(AppState::in_memory(fast_settings(), 5).unwrap());
    let mut updates = state.updates.subscribe();

    fill_correct_via_service(&state).await;
    let out = logic::submit(&state).await;
    let puzzle = out.state.puzzle.unwrap();
    assert_eq!(puzzle.phase, AttemptPhase::Advancing);
    assert_eq!(puzzle.section_index, 0);

    let pushed = tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .unwrap()
        .unwrap();
    let pushed = match pushed {
        ServerWsMessage::State { state } => state,
        other => panic!("expected a state push, got {other:?}"),
    };
    let puzzle = pushed.puzzle.unwrap();
    assert_eq!(puzzle.section_index, 1);
    assert_eq!(puzzle.phase, AttemptPhase::AwaitingInput);
}

#[tokio::test]
async fn late_transition_after_manual_load_is_ignored() {
    let state = Arc::new(AppState::in_memory(fast_settings(), 5).unwrap());

    fill_correct_via_service(&state).await;
    logic::submit(&state).await;
    logic::load_puzzle_at(&state, 4).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let snap = logic::current_snapshot(&state).await;
    let puzzle = snap.puzzle.unwrap();
    assert_eq!(puzzle.id, "two-sum");
    assert_eq!(puzzle.section_index, 0);
    assert_eq!(puzzle.phase, AttemptPhase::AwaitingInput);
}

#[tokio::test]
async fn empty_band_falls_back_to_sequential_in_the_service() {
    let settings = EngineSettings {
        mode: SelectionMode::RatingBanded,
        bands: vec![RatingBand { min_elo: 0, min_difficulty: 4, max_difficulty: 4 }],
        ..fast_settings()
    };
    let state = AppState::in_memory(settings, 1).unwrap();
    let out = logic::next_puzzle(&state).await.unwrap();
    assert_eq!(out.state.progress.current_puzzle_index, 1);
}

#[tokio::test]
async fn empty_band_after_a_solved_puzzle_is_pushed_as_an_error() {
    let settings = EngineSettings {
        mode: SelectionMode::RatingBanded,
        bands: vec![RatingBand { min_elo: 0, min_difficulty: 4, max_difficulty: 4 }],
        ..fast_settings()
    };
    let mut engine = ProgressionEngine::new(catalog(), settings).with_seed(4);
    engine.load_by_index(8); // dijkstra: a single section
    let state = Arc::new(AppState::from_engine(engine, Arc::new(MemoryStore::default()), false));
    let mut updates = state.updates.subscribe();

    fill_correct_via_service(&state).await;
    let out = logic::submit(&state).await;
    assert_eq!(out.state.puzzle.unwrap().phase, AttemptPhase::PuzzleComplete);

    let pushed = tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .unwrap()
        .unwrap();
    let message = match pushed {
        ServerWsMessage::Error { message } => message,
        other => panic!("expected an error push, got {other:?}"),
    };
    assert!(message.contains("no eligible puzzle"), "{message}");

    let puzzle = logic::current_snapshot(&state).await.puzzle.unwrap();
    assert_eq!(puzzle.id, "dijkstra");
    assert_eq!(puzzle.phase, AttemptPhase::PuzzleComplete);
}

#[tokio::test]
async fn progress_is_saved_after_a_verdict() {
    use codesnap_backend::persistence::load_state;

    let state = Arc::new(AppState::in_memory(fast_settings(), 5).unwrap());
    logic::skip(&state).await.unwrap();

    let saved = load_state(state.store.as_ref(), &Catalog::builtin().unwrap()).unwrap();
    assert_eq!(saved.progress.elo, 1185);
    assert_eq!(saved.progress.current_puzzle_index, 1);
}
