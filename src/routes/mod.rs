//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  async_trait,
  extract::{FromRequest, FromRequestParts, Request},
  http::{request::Parts, StatusCode},
  routing::{get, post},
  Json, Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::error::EngineError;
use crate::state::AppState;

pub mod http;
pub mod ws;

/// Header carrying the authenticated learner id, set by the auth proxy in front of us.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The learner making the request. Missing or blank header is a 401.
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
  type Rejection = (StatusCode, Json<serde_json::Value>);

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(USER_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| CallerId(v.to_string()))
      .ok_or_else(|| {
        (
          StatusCode::UNAUTHORIZED,
          Json(serde_json::json!({
            "error": "unauthenticated",
            "message": format!("missing {USER_ID_HEADER} header"),
            "retryable": false,
          })),
        )
      })
  }
}

/// `Json` whose rejections (bad syntax, wrong shape, missing content type)
/// render as `validation_failed` like every other engine error.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
  Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
  S: Send + Sync,
{
  type Rejection = EngineError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    match Json::<T>::from_request(req, state).await {
      Ok(Json(value)) => Ok(ApiJson(value)),
      Err(rejection) => Err(EngineError::ValidationFailed(rejection.body_text())),
    }
  }
}

/// Build the application router with:
/// - WebSocket at `/ws`
/// - session API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/sessions", post(http::http_start_session))
    .route("/api/v1/sessions/:id", get(http::http_get_session))
    .route("/api/v1/sessions/:id/question", get(http::http_current_question))
    .route("/api/v1/sessions/:id/answer", post(http::http_submit_answer))
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .fallback_service(static_service)
}
