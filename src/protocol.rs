//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Answer keys never leave the server: questions go out as `QuestionOut`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::RawAnswer;
use crate::domain::{PromptKind, Question, QuestionType, Session};
use crate::error::EngineError;
use crate::orchestrator::{QuestionView, SessionFlavor, Submission, SubmitOutcome};
use crate::speech::AudioFormat;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartSession {
    session: SessionFlavor,
  },
  CurrentQuestion {
    #[serde(rename = "sessionId")]
    session_id: String,
  },
  SubmitAnswer {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "questionId", default)]
    question_id: Option<String>,
    answer: AnswerPayload,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session {
    session: SessionOut,
    current: CurrentQuestionOut,
  },
  Question {
    #[serde(rename = "sessionId")]
    session_id: String,
    current: CurrentQuestionOut,
  },
  AnswerResult {
    #[serde(rename = "sessionId")]
    session_id: String,
    result: AnswerOut,
  },
  Error {
    error: String,
    message: String,
    retryable: bool,
  },
}

impl From<&EngineError> for ServerWsMessage {
  fn from(e: &EngineError) -> Self {
    ServerWsMessage::Error { error: e.kind().to_string(), message: e.to_string(), retryable: e.is_retryable() }
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PromptOut {
  pub kind: PromptKind,
  pub text: String,
  #[serde(rename = "audioUrl", skip_serializing_if = "Option::is_none")]
  pub audio_url: Option<String>,
}

/// DTO used by both WS and HTTP for question delivery.
#[derive(Debug, Serialize, PartialEq)]
pub struct QuestionOut {
  pub id: String,
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub prompt: PromptOut,
  #[serde(rename = "answerOptions", skip_serializing_if = "Vec::is_empty")]
  pub answer_options: Vec<String>,
  #[serde(rename = "usesAi")]
  pub uses_ai: bool,
}

/// Convert a catalog `Question` to the public DTO, dropping the answer key.
pub fn to_out(q: &Question) -> QuestionOut {
  QuestionOut {
    id: q.id.clone(),
    question_type: q.question_type,
    prompt: PromptOut { kind: q.prompt.kind, text: q.prompt.text.clone(), audio_url: q.prompt.audio_url.clone() },
    answer_options: q.answer_options.clone(),
    uses_ai: q.uses_ai,
  }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrentQuestionOut {
  Question { question: QuestionOut },
  Completed,
}

impl From<&QuestionView> for CurrentQuestionOut {
  fn from(v: &QuestionView) -> Self {
    match v {
      QuestionView::Question(q) => CurrentQuestionOut::Question { question: to_out(q) },
      QuestionView::Completed => CurrentQuestionOut::Completed,
    }
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SessionOut {
  pub id: String,
  #[serde(rename = "courseId")]
  pub course_id: String,
  pub score: u32,
  pub answered: usize,
  pub total: usize,
  #[serde(rename = "expiresAt")]
  pub expires_at: DateTime<Utc>,
  #[serde(rename = "isComplete")]
  pub is_complete: bool,
}

impl From<&Session> for SessionOut {
  fn from(s: &Session) -> Self {
    SessionOut {
      id: s.id.clone(),
      course_id: s.course_id.clone(),
      score: s.score,
      answered: s.answered_questions.len(),
      total: s.questions.len(),
      expires_at: s.expires_at,
      is_complete: s.is_complete(),
    }
  }
}

//
// HTTP request/response DTOs
//

/// Reply to `POST /sessions`: the new session and its first question.
#[derive(Debug, Serialize)]
pub struct SessionStartedOut {
  pub session: SessionOut,
  pub current: CurrentQuestionOut,
}

/// Answer body as sent by clients. Audio travels base64-encoded.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
  Text {
    text: String,
  },
  Audio {
    #[serde(rename = "audioBase64")]
    audio_base64: String,
    mime: String,
  },
  Completion {
    completed: bool,
  },
}

impl AnswerPayload {
  /// Decode into the engine's answer type. Bad base64 or an unknown audio
  /// format is a validation failure.
  pub fn into_raw(self) -> Result<RawAnswer, EngineError> {
    match self {
      AnswerPayload::Text { text } => Ok(RawAnswer::Text(text)),
      AnswerPayload::Completion { completed } => Ok(RawAnswer::Completion { completed }),
      AnswerPayload::Audio { audio_base64, mime } => {
        let format = AudioFormat::parse(&mime)
          .ok_or_else(|| EngineError::ValidationFailed(format!("unsupported audio format '{mime}'")))?;
        // Accept data URLs as produced by FileReader.readAsDataURL.
        let b64 = match audio_base64.split_once(";base64,") {
          Some((_, rest)) => rest,
          None => audio_base64.as_str(),
        };
        let bytes = STANDARD
          .decode(b64.trim())
          .map_err(|e| EngineError::ValidationFailed(format!("audio is not valid base64: {e}")))?;
        Ok(RawAnswer::Audio { bytes, format })
      }
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
  #[serde(rename = "questionId", default)]
  pub question_id: Option<String>,
  pub answer: AnswerPayload,
}

impl AnswerIn {
  pub fn into_submission(self) -> Result<Submission, EngineError> {
    Ok(Submission { answer: self.answer.into_raw()?, question_id: self.question_id })
  }
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
  pub correct: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub grade: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub transcript: Option<String>,
  pub score: u32,
  #[serde(rename = "isComplete")]
  pub is_complete: bool,
  pub answered: usize,
  pub total: usize,
  pub replayed: bool,
  #[serde(rename = "nextQuestion", skip_serializing_if = "Option::is_none")]
  pub next_question: Option<QuestionOut>,
}

impl From<SubmitOutcome> for AnswerOut {
  fn from(o: SubmitOutcome) -> Self {
    AnswerOut {
      correct: o.verdict.is_correct,
      suggestion: o.verdict.suggestion,
      grade: o.verdict.grade,
      transcript: o.verdict.transcript,
      score: o.score,
      is_complete: o.is_complete,
      answered: o.answered,
      total: o.total,
      replayed: o.replayed,
      next_question: o.next_question.as_ref().map(to_out),
    }
  }
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub courses: usize,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{CorrectAnswer, Prompt};

  #[test]
  fn question_out_hides_the_answer_key() {
    let q = Question {
      id: "q1".into(),
      question_type: QuestionType::MultipleChoice,
      prompt: Prompt { kind: PromptKind::Text, text: "Pick".into(), audio_url: None },
      answer_options: vec!["a".into(), "b".into()],
      correct_answer: CorrectAnswer::OptionIndex { index: 1 },
      uses_ai: false,
    };
    let json = serde_json::to_value(to_out(&q)).expect("serialize");
    assert_eq!(json["type"], "multiple_choice");
    assert_eq!(json["answerOptions"][1], "b");
    assert!(json.get("correct_answer").is_none());
    assert!(json.to_string().find("option_index").is_none());
  }

  #[test]
  fn audio_payload_decodes_plain_and_data_url_base64() {
    let plain: AnswerPayload =
      serde_json::from_str(r#"{"kind":"audio","audioBase64":"AQID","mime":"audio/webm;codecs=opus"}"#).expect("json");
    assert_eq!(plain.into_raw().expect("raw"), RawAnswer::Audio { bytes: vec![1, 2, 3], format: AudioFormat::Webm });

    let data_url = AnswerPayload::Audio { audio_base64: "data:audio/wav;base64,AQID".into(), mime: "audio/wav".into() };
    assert_eq!(data_url.into_raw().expect("raw"), RawAnswer::Audio { bytes: vec![1, 2, 3], format: AudioFormat::Wav });
  }

  #[test]
  fn bad_audio_is_a_validation_failure() {
    let bad_b64 = AnswerPayload::Audio { audio_base64: "***".into(), mime: "audio/wav".into() };
    assert!(matches!(bad_b64.into_raw(), Err(EngineError::ValidationFailed(_))));
    let bad_mime = AnswerPayload::Audio { audio_base64: "AQID".into(), mime: "video/avi".into() };
    assert!(matches!(bad_mime.into_raw(), Err(EngineError::ValidationFailed(_))));
  }

  #[test]
  fn ws_messages_use_snake_case_tags() {
    let msg: ClientWsMessage = serde_json::from_str(
      r#"{"type":"submit_answer","sessionId":"s1","questionId":"q2","answer":{"kind":"text","text":"Paris"}}"#,
    )
    .expect("json");
    match msg {
      ClientWsMessage::SubmitAnswer { session_id, question_id, answer } => {
        assert_eq!(session_id, "s1");
        assert_eq!(question_id.as_deref(), Some("q2"));
        assert_eq!(answer, AnswerPayload::Text { text: "Paris".into() });
      }
      other => panic!("unexpected {other:?}"),
    }

    let start: ClientWsMessage =
      serde_json::from_str(r#"{"type":"start_session","session":{"flavor":"daily_challenge","language":"fr"}}"#)
        .expect("json");
    assert!(matches!(start, ClientWsMessage::StartSession { session: SessionFlavor::DailyChallenge { .. } }));

    let out = serde_json::to_value(ServerWsMessage::from(&EngineError::Forbidden)).expect("serialize");
    assert_eq!(out["type"], "error");
    assert_eq!(out["error"], "forbidden");
    assert_eq!(out["retryable"], false);
  }
}
