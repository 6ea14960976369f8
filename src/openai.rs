//! Minimal OpenAI client for grading and speech recognition.
//!
//! We call `chat/completions` requesting a strict JSON object for grading, and
//! `audio/transcriptions` (verbose JSON) for speech. Calls are instrumented and
//! log model names, latencies and sizes, never contents.
//!
//! NOTE: We never log the API key.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::assessment::{Grade, GradingRubric, TextGrader};
use crate::config::Prompts;
use crate::error::{GradingError, TranscriptionError};
use crate::speech::{BlobRef, BlobStore, SpeechRecognizer, Transcript, CANONICAL_CONTENT_TYPE};
use crate::util::fill_template;

const CLIENT_UA: &str = "lingua-backend/0.1";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub grading_model: String,
  pub transcribe_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  ///
  /// `request_timeout` is a transport backstop; the engine applies its own,
  /// shorter, per-call timeouts.
  pub fn from_env(prompts: Prompts, request_timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let grading_model =
      std::env::var("OPENAI_GRADING_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let transcribe_model =
      std::env::var("OPENAI_TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".into());

    let client = match reqwest::Client::builder().timeout(request_timeout).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "lingua_backend", error = %e, "Failed to build HTTP client; OpenAI disabled");
        return None;
      }
    };

    Some(Self { client, api_key, base_url, grading_model, transcribe_model, prompts })
  }

  /// JSON-object chat completion. Returns the raw content string of the first choice.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json(&self, model: &str, system: &str, user: &str, temperature: f32) -> Result<String, GradingError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(GradingError::Remote(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| GradingError::Malformed(format!("completion envelope: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(target: "grading", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| GradingError::Malformed("completion has no content".into()))
  }

  /// POST canonical audio to the transcription endpoint.
  #[instrument(level = "info", skip(self, audio), fields(model = %self.transcribe_model, audio_len = audio.len()))]
  async fn transcribe_bytes(&self, file_name: &str, audio: Vec<u8>) -> Result<Transcript, TranscriptionError> {
    let url = format!("{}/audio/transcriptions", self.base_url);
    let part = reqwest::multipart::Part::bytes(audio)
      .file_name(file_name.to_string())
      .mime_str(CANONICAL_CONTENT_TYPE)
      .map_err(|e| TranscriptionError::Recognition(e.to_string()))?;
    let form = reqwest::multipart::Form::new()
      .part("file", part)
      .text("model", self.transcribe_model.clone())
      .text("response_format", "verbose_json");

    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .multipart(form)
      .send()
      .await
      .map_err(|e| TranscriptionError::Recognition(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(TranscriptionError::Recognition(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: TranscriptionResponse = res
      .json()
      .await
      .map_err(|e| TranscriptionError::Recognition(format!("transcription body: {e}")))?;
    Ok(body.into_transcript())
  }
}

#[async_trait]
impl TextGrader for OpenAI {
  #[instrument(level = "info", skip(self, prompt, text), fields(?rubric, prompt_len = prompt.len(), text_len = text.len()))]
  async fn grade(&self, rubric: GradingRubric, prompt: &str, text: &str) -> Result<Grade, GradingError> {
    let (system, user) = match rubric {
      GradingRubric::Essay => (
        &self.prompts.essay_system,
        fill_template(&self.prompts.essay_user_template, &[("prompt", prompt), ("answer", text)]),
      ),
      GradingRubric::Speech => (
        &self.prompts.speech_system,
        fill_template(&self.prompts.speech_user_template, &[("expected", prompt), ("transcript", text)]),
      ),
    };
    let raw = self.chat_json(&self.grading_model, system, &user, 0.2).await?;
    let grade = parse_grade(&raw)?;
    info!(target: "grading", score = grade.score, "Grade received");
    Ok(grade)
  }
}

/// Speech recognition backed by OpenAI, reading audio back out of blob storage.
pub struct OpenAiRecognizer {
  openai: OpenAI,
  store: Arc<dyn BlobStore>,
}

impl OpenAiRecognizer {
  pub fn new(openai: OpenAI, store: Arc<dyn BlobStore>) -> Self {
    Self { openai, store }
  }
}

#[async_trait]
impl SpeechRecognizer for OpenAiRecognizer {
  async fn recognize(&self, blob: &BlobRef) -> Result<Vec<Transcript>, TranscriptionError> {
    let audio = self.store.get(blob).await?;
    let transcript = self.openai.transcribe_bytes(&blob.key, audio).await?;
    Ok(vec![transcript])
  }
}

/// Parse the grader payload `{suggestion: string, score: integer 0..=100}`.
///
/// Anything else is `Malformed`; a bad payload never turns into a verdict.
pub fn parse_grade(raw: &str) -> Result<Grade, GradingError> {
  #[derive(Deserialize)]
  struct RawGrade {
    suggestion: String,
    score: serde_json::Number,
  }

  let text = strip_code_fence(raw);
  let parsed: RawGrade = serde_json::from_str(text)
    .map_err(|e| GradingError::Malformed(format!("grade JSON: {e}")))?;
  let score = parsed
    .score
    .as_u64()
    .filter(|s| *s <= 100)
    .ok_or_else(|| GradingError::Malformed(format!("score {} is not an integer in 0..=100", parsed.score)))?;
  Ok(Grade { score: score as u8, suggestion: parsed.suggestion.trim().to_string() })
}

fn strip_code_fence(raw: &str) -> &str {
  let t = raw.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

// --- Transcription DTOs ---

#[derive(Deserialize)]
struct TranscriptionResponse {
  text: String,
  #[serde(default)] segments: Vec<TranscriptionSegment>,
}
#[derive(Deserialize)]
struct TranscriptionSegment { avg_logprob: f64 }

impl TranscriptionResponse {
  /// Confidence is the mean per-segment probability, `exp(avg_logprob)`.
  fn into_transcript(self) -> Transcript {
    let confidence = if self.segments.is_empty() {
      1.0
    } else {
      let sum: f64 = self.segments.iter().map(|s| s.avg_logprob.exp().clamp(0.0, 1.0)).sum();
      sum / self.segments.len() as f64
    };
    Transcript { text: self.text, confidence }
  }
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_well_formed_grade() {
    let g = parse_grade(r#"{"suggestion": " Use the passé composé. ", "score": 82}"#).expect("grade");
    assert_eq!(g.score, 82);
    assert_eq!(g.suggestion, "Use the passé composé.");
  }

  #[test]
  fn tolerates_code_fences() {
    let g = parse_grade("```json\n{\"suggestion\": \"ok\", \"score\": 70}\n```").expect("grade");
    assert_eq!(g.score, 70);
  }

  #[test]
  fn malformed_payloads_are_errors_not_verdicts() {
    for raw in [
      "not json",
      r#"{"score": 90}"#,
      r#"{"suggestion": "x"}"#,
      r#"{"suggestion": "x", "score": "90"}"#,
      r#"{"suggestion": "x", "score": 101}"#,
      r#"{"suggestion": "x", "score": -3}"#,
      r#"{"suggestion": "x", "score": 72.5}"#,
    ] {
      assert!(matches!(parse_grade(raw), Err(GradingError::Malformed(_))), "accepted {raw}");
    }
  }

  #[test]
  fn transcription_confidence_from_segments() {
    let body: TranscriptionResponse = serde_json::from_str(
      r#"{"text": "hola", "segments": [{"avg_logprob": 0.0}, {"avg_logprob": -0.6931471805599453}]}"#,
    )
    .expect("body");
    let t = body.into_transcript();
    assert_eq!(t.text, "hola");
    assert!((t.confidence - 0.75).abs() < 1e-9);
  }

  #[test]
  fn extracts_error_message() {
    let body = r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
