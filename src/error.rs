//! Error taxonomy for the session engine and its adapters.
//!
//! `EngineError` is what the orchestrator returns; transport maps it to HTTP
//! status codes. Grading and transcription failures stay distinguishable from
//! an incorrect answer all the way up.

use std::time::Duration;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
  #[error("{what} not found: {id}")]
  NotFound { what: &'static str, id: String },

  #[error("session belongs to another user")]
  Forbidden,

  #[error("invalid answer: {0}")]
  ValidationFailed(String),

  #[error("grading unavailable: {0}")]
  GradingUnavailable(#[from] GradingError),

  #[error("session expired at {expires_at}")]
  SessionExpired { expires_at: DateTime<Utc> },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("no course available for language '{0}'")]
  NoCourseAvailable(String),
}

impl EngineError {
  pub fn session_not_found(id: impl Into<String>) -> Self {
    Self::NotFound { what: "session", id: id.into() }
  }

  pub fn question_not_found(id: impl Into<String>) -> Self {
    Self::NotFound { what: "question", id: id.into() }
  }

  pub fn course_not_found(id: impl Into<String>) -> Self {
    Self::NotFound { what: "course", id: id.into() }
  }

  /// Short machine-readable tag used in response bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::NotFound { .. } => "not_found",
      Self::Forbidden => "forbidden",
      Self::ValidationFailed(_) => "validation_failed",
      Self::GradingUnavailable(GradingError::Transcription(_)) => "transcription_failed",
      Self::GradingUnavailable(_) => "grading_unavailable",
      Self::SessionExpired { .. } => "session_expired",
      Self::Conflict(_) => "conflict",
      Self::NoCourseAvailable(_) => "no_course_available",
    }
  }

  /// Whether the client should offer a retry rather than give up.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::GradingUnavailable(_))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound { .. } | Self::NoCourseAvailable(_) => StatusCode::NOT_FOUND,
      Self::Forbidden => StatusCode::FORBIDDEN,
      Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Self::GradingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      Self::SessionExpired { .. } => StatusCode::GONE,
      Self::Conflict(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for EngineError {
  fn into_response(self) -> Response {
    let body = serde_json::json!({
      "error": self.kind(),
      "message": self.to_string(),
      "retryable": self.is_retryable(),
    });
    (self.status(), Json(body)).into_response()
  }
}

/// A remote grader or the speech pipeline could not produce a verdict.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradingError {
  #[error("grader timed out after {0:?}")]
  Timeout(Duration),

  #[error("grader request failed: {0}")]
  Remote(String),

  #[error("malformed grader response: {0}")]
  Malformed(String),

  #[error("not configured")]
  NotConfigured,

  #[error("transcription failed: {0}")]
  Transcription(#[from] TranscriptionError),
}

impl From<reqwest::Error> for GradingError {
  fn from(e: reqwest::Error) -> Self {
    GradingError::Remote(e.to_string())
  }
}

/// Failure of one stage of the speech pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranscriptionError {
  #[error("audio conversion failed: {0}")]
  Conversion(String),

  #[error("blob storage failed: {0}")]
  Storage(String),

  #[error("speech recognition failed: {0}")]
  Recognition(String),

  #[error("recognizer returned no transcript")]
  EmptyTranscript,
}

/// Loading the TOML configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io { path: String, #[source] source: std::io::Error },

  #[error("failed to parse {path}: {source}")]
  Parse { path: String, #[source] source: toml::de::Error },
}
