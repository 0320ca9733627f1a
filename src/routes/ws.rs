//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic with a single JSON reply. Deferred transitions
//! (section advance, next puzzle) are pushed as unsolicited `state` messages,
//! or `error` when no next puzzle could be selected.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codesnap_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codesnap_backend", "WebSocket connected");
  let mut updates = state.updates.subscribe();

  loop {
    let reply_msg = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "codesnap_backend", "WS received: {:?}", &msg);
            handle_client_ws(msg, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => continue,
        Some(Err(e)) => {
          warn!(target: "codesnap_backend", error = %e, "WS receive error");
          break;
        }
      },
      pushed = updates.recv() => match pushed {
        Ok(pushed) => pushed,
        Err(RecvError::Lagged(skipped)) => {
          // Only the latest state matters; the next push catches up.
          debug!(target: "codesnap_backend", skipped, "WS update receiver lagged");
          continue;
        }
        Err(RecvError::Closed) => break,
      },
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "codesnap_backend", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "codesnap_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetState => ServerWsMessage::State { state: logic::current_snapshot(state).await },

    ClientWsMessage::ListPuzzles => ServerWsMessage::Puzzles { puzzles: logic::list_puzzles(state).await },

    ClientWsMessage::LoadPuzzle { index } => action(logic::load_puzzle_at(state, index).await),

    ClientWsMessage::NextPuzzle => match logic::next_puzzle(state).await {
      Ok(out) => action(out),
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::PlaceBlock { block_id, slot_id } => {
      let out = logic::place_block(state, &block_id, &slot_id).await;
      info!(target: "puzzle", block = %block_id, slot = %slot_id, applied = out.applied, "WS place_block");
      action(out)
    }

    ClientWsMessage::ClearSlot { slot_id } => action(logic::clear_slot(state, &slot_id).await),

    ClientWsMessage::Submit => {
      let out = logic::submit(state).await;
      info!(target: "puzzle", verdict = ?out.verdict, "WS submit evaluated");
      ServerWsMessage::SubmitResult { verdict: out.verdict, feedback: out.feedback, state: out.state }
    }

    ClientWsMessage::ResetSection => action(logic::reset_section(state).await),

    ClientWsMessage::Retry => action(logic::retry(state).await),

    ClientWsMessage::Skip => match logic::skip(state).await {
      Ok(out) => action(out),
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::ResetProgress => action(logic::reset_progress(state).await),

    ClientWsMessage::UpdateDeveloper { patch } => action(logic::update_developer(state, patch).await),
  }
}

fn action(out: crate::protocol::ActionOut) -> ServerWsMessage {
  ServerWsMessage::Action { applied: out.applied, state: out.state }
}
