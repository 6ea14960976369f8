//! Lingua · Learning Session Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI integration for essay and voice grading
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   OPENAI_API_KEY           : enables OpenAI grading/transcription if present
//!   OPENAI_BASE_URL          : default "https://api.openai.com/v1"
//!   OPENAI_GRADING_MODEL     : default "gpt-4o-mini"
//!   OPENAI_TRANSCRIBE_MODEL  : default "whisper-1"
//!   ENGINE_CONFIG_PATH       : path to TOML config (prompts, limits, courses)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{debug, info};

use lingua_backend::routes::build_router;
use lingua_backend::state::AppState;
use lingua_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::new());

  // Periodic purge of sessions nobody can use anymore.
  let sweeper = state.clone();
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(sweeper.sweep_interval);
    loop {
      tick.tick().await;
      let removed = sweeper.orchestrator.sweep_expired().await;
      debug!(target: "session", removed, "Sweep finished");
    }
  });

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "lingua_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "lingua_backend", "Shutdown requested");
    })
    .await?;
  Ok(())
}
