//! HTTP endpoint handlers. These are thin wrappers that forward to the orchestrator.
//! Each handler is instrumented; engine errors render through `EngineError: IntoResponse`.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use super::{ApiJson, CallerId};
use crate::error::EngineError;
use crate::orchestrator::SessionFlavor;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, courses: state.course_count })
}

#[instrument(level = "info", skip(state, caller), fields(user = %caller.0))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  ApiJson(flavor): ApiJson<SessionFlavor>,
) -> Result<Json<SessionStartedOut>, EngineError> {
  let orch = &state.orchestrator;
  let session = orch.start_session(&caller.0, flavor).await?;
  let current = orch.current_question(&caller.0, &session.id).await?;
  info!(target: "session", id = %session.id, "HTTP session started");
  Ok(Json(SessionStartedOut { session: SessionOut::from(&session), current: CurrentQuestionOut::from(&current) }))
}

#[instrument(level = "info", skip(state, caller), fields(user = %caller.0))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, EngineError> {
  let session = state.orchestrator.get_session(&caller.0, &id).await?;
  Ok(Json(SessionOut::from(&session)))
}

#[instrument(level = "info", skip(state, caller), fields(user = %caller.0))]
pub async fn http_current_question(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Path(id): Path<String>,
) -> Result<Json<CurrentQuestionOut>, EngineError> {
  let view = state.orchestrator.current_question(&caller.0, &id).await?;
  Ok(Json(CurrentQuestionOut::from(&view)))
}

#[instrument(level = "info", skip(state, caller, body), fields(user = %caller.0, question = ?body.question_id))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  caller: CallerId,
  Path(id): Path<String>,
  ApiJson(body): ApiJson<AnswerIn>,
) -> Result<Json<AnswerOut>, EngineError> {
  let submission = body.into_submission()?;
  let outcome = state.orchestrator.submit_answer(&caller.0, &id, submission).await?;
  info!(target: "session", %id, correct = outcome.verdict.is_correct, score = outcome.score, "HTTP answer evaluated");
  Ok(Json(AnswerOut::from(outcome)))
}
