//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Forwarding player actions to the engine and snapshotting the result
//!   - Scheduling deferred transitions (section advance, next puzzle) on tokio
//!   - Falling back to sequential order when the rating band is empty
//!   - Saving progress after every state change (failures are only logged)

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::DeveloperSettingsPatch;
use crate::engine::{
  PendingTransition, ProgressionEngine, TransitionKind, TransitionResult, TransitionToken, Verdict,
};
use crate::error::EngineError;
use crate::persistence::{save_state, SavedState};
use crate::protocol::{
  feedback_for, puzzle_list, snapshot, verdict_out, ActionOut, PuzzleListItem, ServerWsMessage, SnapshotOut,
  SubmitOut,
};
use crate::state::AppState;

#[instrument(level = "debug", skip(state))]
pub async fn current_snapshot(state: &AppState) -> SnapshotOut {
  let engine = state.engine.lock().await;
  snapshot(&engine)
}

#[instrument(level = "debug", skip(state))]
pub async fn list_puzzles(state: &AppState) -> Vec<PuzzleListItem> {
  let engine = state.engine.lock().await;
  puzzle_list(&engine)
}

#[instrument(level = "info", skip(state))]
pub async fn load_puzzle_at(state: &AppState, index: i64) -> ActionOut {
  let mut engine = state.engine.lock().await;
  let wrapped = engine.catalog().wrap_signed(index);
  let loaded = engine.load_by_index(wrapped);
  info!(target: "puzzle", requested = index, loaded, "Puzzle picked from list");
  persist(state, &engine);
  ActionOut { applied: true, state: snapshot(&engine) }
}

#[instrument(level = "info", skip(state))]
pub async fn next_puzzle(state: &AppState) -> Result<ActionOut, EngineError> {
  let mut engine = state.engine.lock().await;
  let picked = engine.load_next();
  with_fallback(&mut engine, state.fallback_to_sequential, picked)?;
  persist(state, &engine);
  Ok(ActionOut { applied: true, state: snapshot(&engine) })
}

#[instrument(level = "debug", skip(state))]
pub async fn place_block(state: &AppState, block_id: &str, slot_id: &str) -> ActionOut {
  let mut engine = state.engine.lock().await;
  let applied = engine.place_block(block_id, slot_id);
  ActionOut { applied, state: snapshot(&engine) }
}

#[instrument(level = "debug", skip(state))]
pub async fn clear_slot(state: &AppState, slot_id: &str) -> ActionOut {
  let mut engine = state.engine.lock().await;
  let applied = engine.clear_slot(slot_id).is_some();
  ActionOut { applied, state: snapshot(&engine) }
}

/// Check the current section. Correct answers schedule the follow-up transition.
#[instrument(level = "info", skip(state))]
pub async fn submit(state: &Arc<AppState>) -> SubmitOut {
  let mut engine = state.engine.lock().await;
  let verdict = engine.submit();

  match &verdict {
    Verdict::SectionSolved { next, .. } | Verdict::PuzzleSolved { next, .. } => {
      schedule(state.clone(), *next);
      persist(state, &engine);
    }
    Verdict::Incorrect { .. } => persist(state, &engine),
    Verdict::Ignored | Verdict::Incomplete => {
      warn!(target: "puzzle", verdict = ?verdict, "Submission not accepted");
    }
  }

  SubmitOut {
    verdict: verdict_out(&verdict),
    feedback: feedback_for(&verdict),
    state: snapshot(&engine),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn reset_section(state: &AppState) -> ActionOut {
  let mut engine = state.engine.lock().await;
  let applied = engine.reset_section();
  ActionOut { applied, state: snapshot(&engine) }
}

#[instrument(level = "info", skip(state))]
pub async fn retry(state: &AppState) -> ActionOut {
  let mut engine = state.engine.lock().await;
  let applied = engine.retry();
  ActionOut { applied, state: snapshot(&engine) }
}

#[instrument(level = "info", skip(state))]
pub async fn skip(state: &AppState) -> Result<ActionOut, EngineError> {
  let mut engine = state.engine.lock().await;
  let picked = engine.skip();
  let result = with_fallback(&mut engine, state.fallback_to_sequential, picked);
  // The failure may already be recorded even when no next puzzle was found.
  persist(state, &engine);
  result?;
  Ok(ActionOut { applied: true, state: snapshot(&engine) })
}

#[instrument(level = "info", skip(state))]
pub async fn reset_progress(state: &AppState) -> ActionOut {
  let mut engine = state.engine.lock().await;
  engine.reset_all_progress();
  persist(state, &engine);
  ActionOut { applied: true, state: snapshot(&engine) }
}

#[instrument(level = "info", skip(state))]
pub async fn update_developer(state: &AppState, patch: DeveloperSettingsPatch) -> ActionOut {
  let mut engine = state.engine.lock().await;
  engine.update_developer_settings(patch);
  persist(state, &engine);
  ActionOut { applied: true, state: snapshot(&engine) }
}

/// Apply a deferred transition now. `Ok(None)` when the token was stale; an
/// empty rating band with fallback disabled is returned as the error.
#[instrument(level = "debug", skip(state))]
pub async fn apply_transition(
  state: &AppState,
  token: TransitionToken,
) -> Result<Option<SnapshotOut>, EngineError> {
  let mut engine = state.engine.lock().await;
  let result = match engine.apply_transition(token) {
    Ok(r) => r,
    Err(e) => {
      with_fallback(&mut engine, state.fallback_to_sequential, Err(e))?;
      TransitionResult::Applied(TransitionKind::LoadNextPuzzle)
    }
  };

  match result {
    TransitionResult::Stale => Ok(None),
    TransitionResult::Applied(kind) => {
      info!(target: "puzzle", ?kind, "Deferred transition applied");
      persist(state, &engine);
      Ok(Some(snapshot(&engine)))
    }
  }
}

// -------- Internals --------

/// Sleep for the pacing delay, apply, and push the outcome to WebSocket clients.
fn schedule(state: Arc<AppState>, pending: PendingTransition) {
  tokio::spawn(async move {
    tokio::time::sleep(pending.delay).await;
    let pushed = match apply_transition(&state, pending.token).await {
      Ok(Some(snapshot)) => ServerWsMessage::State { state: snapshot },
      Ok(None) => return,
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    };
    // No receivers is fine: nobody is connected over WebSocket.
    let _ = state.updates.send(pushed);
  });
}

/// Empty rating band: serve the next puzzle in order when configured to.
fn with_fallback(
  engine: &mut ProgressionEngine,
  fallback: bool,
  picked: Result<usize, EngineError>,
) -> Result<usize, EngineError> {
  match picked {
    Err(e @ EngineError::NoEligiblePuzzle { .. }) => {
      if fallback {
        let index = engine.load_next_sequential();
        warn!(target: "puzzle", error = %e, index, "Falling back to sequential selection");
        Ok(index)
      } else {
        error!(target: "puzzle", error = %e, "No puzzle selected");
        Err(e)
      }
    }
    other => other,
  }
}

fn persist(state: &AppState, engine: &ProgressionEngine) {
  let saved = SavedState::capture(engine.catalog(), engine.progress(), engine.developer());
  if let Err(e) = save_state(state.store.as_ref(), &saved) {
    error!(target: "codesnap_backend", error = %e, "Failed to save progress");
  }
}
