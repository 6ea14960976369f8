//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the orchestrator. We reply with a single JSON message per request.
//! The caller id is taken from the upgrade request and fixed for the connection.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use super::CallerId;
use crate::error::EngineError;
use crate::protocol::{ClientWsMessage, CurrentQuestionOut, ServerWsMessage, SessionOut};
use crate::orchestrator::Submission;
use crate::state::AppState;

#[instrument(level = "info", skip(state, ws, caller), fields(user = %caller.0))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>, caller: CallerId) -> impl IntoResponse {
  info!(target: "lingua_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, caller))
}

#[instrument(level = "info", skip(socket, state, caller), fields(user = %caller.0))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, caller: CallerId) {
  info!(target: "lingua_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "lingua_backend", bytes = txt.len(), "WS message received");
            match handle_client_ws(incoming, &state, &caller.0).await {
              Ok(reply) => reply,
              Err(e) => ServerWsMessage::from(&e),
            }
          }
          Err(e) => ServerWsMessage::from(&EngineError::ValidationFailed(format!("invalid message: {e}"))),
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "internal", "message": format!("Serialization error: {}", e), "retryable": false })
            .to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "lingua_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "lingua_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, user_id: &str) -> Result<ServerWsMessage, EngineError> {
  let orch = &state.orchestrator;
  match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::StartSession { session } => {
      let session = orch.start_session(user_id, session).await?;
      let current = orch.current_question(user_id, &session.id).await?;
      info!(target: "session", id = %session.id, "WS session started");
      Ok(ServerWsMessage::Session { session: SessionOut::from(&session), current: CurrentQuestionOut::from(&current) })
    }

    ClientWsMessage::CurrentQuestion { session_id } => {
      let view = orch.current_question(user_id, &session_id).await?;
      Ok(ServerWsMessage::Question { session_id, current: CurrentQuestionOut::from(&view) })
    }

    ClientWsMessage::SubmitAnswer { session_id, question_id, answer } => {
      let submission = Submission { answer: answer.into_raw()?, question_id };
      let outcome = orch.submit_answer(user_id, &session_id, submission).await?;
      info!(target: "session", id = %session_id, correct = outcome.verdict.is_correct, score = outcome.score, "WS answer evaluated");
      Ok(ServerWsMessage::AnswerResult { session_id, result: outcome.into() })
    }
  }
}
