//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::{info, instrument};

use crate::domain::DeveloperSettingsPatch;
use crate::error::EngineError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// Engine errors as a JSON body with a fitting status code.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self.0 {
      EngineError::NoEligiblePuzzle { .. } => StatusCode::CONFLICT,
      EngineError::NoActivePuzzle => StatusCode::NOT_FOUND,
    };
    (status, Json(ErrorOut { message: self.0.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::current_snapshot(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_puzzles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let puzzles = logic::list_puzzles(&state).await;
  info!(target: "puzzle", count = puzzles.len(), "HTTP puzzle list served");
  Json(PuzzlesOut { puzzles })
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_load_puzzle(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoadIn>,
) -> impl IntoResponse {
  Json(logic::load_puzzle_at(&state, body.index).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_next_puzzle(State(state): State<Arc<AppState>>) -> Result<Json<ActionOut>, ApiError> {
  Ok(Json(logic::next_puzzle(&state).await?))
}

#[instrument(level = "info", skip(state, body), fields(block = %body.block_id, slot = %body.slot_id))]
pub async fn http_place_block(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PlaceIn>,
) -> impl IntoResponse {
  let out = logic::place_block(&state, &body.block_id, &body.slot_id).await;
  info!(target: "puzzle", block = %body.block_id, slot = %body.slot_id, applied = out.applied, "HTTP place_block");
  Json(out)
}

#[instrument(level = "info", skip(state, body), fields(slot = %body.slot_id))]
pub async fn http_clear_slot(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ClearIn>,
) -> impl IntoResponse {
  Json(logic::clear_slot(&state, &body.slot_id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let out = logic::submit(&state).await;
  info!(target: "puzzle", verdict = ?out.verdict, "HTTP submit evaluated");
  Json(out)
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_section(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::reset_section(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_retry(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::retry(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_skip(State(state): State<Arc<AppState>>) -> Result<Json<ActionOut>, ApiError> {
  Ok(Json(logic::skip(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::reset_progress(&state).await)
}

#[instrument(level = "info", skip(state, patch))]
pub async fn http_update_developer(
  State(state): State<Arc<AppState>>,
  Json(patch): Json<DeveloperSettingsPatch>,
) -> impl IntoResponse {
  Json(logic::update_developer(&state, patch).await)
}
