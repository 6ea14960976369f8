//! Assessment engine: `(question, raw answer) -> verdict`.
//!
//! Dispatch is an exhaustive match on `QuestionType`:
//!   - MultipleChoice, FillIn: local, case-insensitive comparison
//!   - Essay: AI text grader, correct when score >= threshold
//!   - Voice: transcribe, then local compare against the prompt, else AI grade
//!   - Writing: the client's completion signal is the verdict
//!
//! Remote failures come back as `EngineError::GradingUnavailable`, never as an
//! incorrect verdict.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use crate::config::GradingCfg;
use crate::domain::{AssessmentVerdict, CorrectAnswer, Question, QuestionType};
use crate::error::{EngineError, GradingError, TranscriptionError};
use crate::speech::{AudioFormat, Transcriber, Transcript};
use crate::util::{eq_ignore_case, normalize_spoken};

/// Which grading instructions the remote grader should apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradingRubric {
  /// `prompt` is the task, `text` the learner's answer.
  Essay,
  /// `prompt` is the target sentence, `text` the transcript.
  Speech,
}

/// Parsed grader response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grade {
  pub score: u8,
  pub suggestion: String,
}

#[async_trait]
pub trait TextGrader: Send + Sync {
  async fn grade(&self, rubric: GradingRubric, prompt: &str, text: &str) -> Result<Grade, GradingError>;
}

/// Stand-in installed when no AI backend is configured.
pub struct Unconfigured;

#[async_trait]
impl TextGrader for Unconfigured {
  async fn grade(&self, _rubric: GradingRubric, _prompt: &str, _text: &str) -> Result<Grade, GradingError> {
    Err(GradingError::NotConfigured)
  }
}

#[async_trait]
impl Transcriber for Unconfigured {
  async fn transcribe(&self, _audio: &[u8], _format: AudioFormat) -> Result<Transcript, TranscriptionError> {
    Err(TranscriptionError::Recognition("speech recognition is not configured".into()))
  }
}

/// A submitted answer, before grading.
#[derive(Clone, Debug, PartialEq)]
pub enum RawAnswer {
  Text(String),
  Audio { bytes: Vec<u8>, format: AudioFormat },
  /// Stroke/quiz completion reported by the client.
  Completion { completed: bool },
}

impl RawAnswer {
  fn kind(&self) -> &'static str {
    match self {
      RawAnswer::Text(_) => "text",
      RawAnswer::Audio { .. } => "audio",
      RawAnswer::Completion { .. } => "completion",
    }
  }

  fn mismatch(&self, wanted: &str) -> EngineError {
    EngineError::ValidationFailed(format!("expected a {} answer, got {}", wanted, self.kind()))
  }

  fn as_text(&self) -> Result<&str, EngineError> {
    match self {
      RawAnswer::Text(t) => Ok(t),
      _ => Err(self.mismatch("text")),
    }
  }

  fn as_audio(&self) -> Result<(&[u8], AudioFormat), EngineError> {
    match self {
      RawAnswer::Audio { bytes, format } => Ok((bytes, *format)),
      _ => Err(self.mismatch("audio")),
    }
  }

  fn as_completion(&self) -> Result<bool, EngineError> {
    match self {
      RawAnswer::Completion { completed } => Ok(*completed),
      _ => Err(self.mismatch("completion")),
    }
  }
}

/// Reject answers that are empty or of the wrong kind for the question.
/// Nothing is graded when this fails.
pub fn validate_answer(question: &Question, answer: &RawAnswer) -> Result<(), EngineError> {
  let expected = match question.question_type {
    QuestionType::MultipleChoice | QuestionType::FillIn | QuestionType::Essay => "text",
    QuestionType::Voice => "audio",
    QuestionType::Writing => "completion",
  };
  if answer.kind() != expected {
    return Err(EngineError::ValidationFailed(format!(
      "{:?} question expects a {} answer, got {}",
      question.question_type,
      expected,
      answer.kind()
    )));
  }
  match answer {
    RawAnswer::Text(t) if t.trim().is_empty() => Err(EngineError::ValidationFailed("answer is empty".into())),
    RawAnswer::Audio { bytes, .. } if bytes.is_empty() => {
      Err(EngineError::ValidationFailed("audio is empty".into()))
    }
    _ => Ok(()),
  }
}

/// Case-insensitive match against `answer_options[correct index]`.
pub fn grade_multiple_choice(question: &Question, answer: &str) -> bool {
  match &question.correct_answer {
    CorrectAnswer::OptionIndex { index } => question
      .answer_options
      .get(*index)
      .is_some_and(|opt| eq_ignore_case(opt, answer)),
    other => {
      error!(target: "grading", id = %question.id, ?other, "Multiple choice question without option index");
      false
    }
  }
}

/// Case-insensitive match against the first accepted string only.
///
/// Later entries in `values` are not consulted; widening this to match-any
/// would change scoring.
pub fn grade_fill_in(question: &Question, answer: &str) -> bool {
  match &question.correct_answer {
    CorrectAnswer::Accepted { values } => values.first().is_some_and(|v| eq_ignore_case(v, answer)),
    other => {
      error!(target: "grading", id = %question.id, ?other, "Fill-in question without accepted answers");
      false
    }
  }
}

pub struct AssessmentEngine {
  grader: Arc<dyn TextGrader>,
  transcriber: Arc<dyn Transcriber>,
  pass_threshold: u8,
  grading_timeout: Duration,
  speech_timeout: Duration,
}

impl AssessmentEngine {
  pub fn new(grader: Arc<dyn TextGrader>, transcriber: Arc<dyn Transcriber>, cfg: &GradingCfg) -> Self {
    Self {
      grader,
      transcriber,
      pass_threshold: cfg.pass_threshold,
      grading_timeout: Duration::from_secs(cfg.timeout_secs),
      speech_timeout: Duration::from_secs(cfg.speech_timeout_secs),
    }
  }

  pub fn pass_threshold(&self) -> u8 {
    self.pass_threshold
  }

  #[instrument(level = "info", skip(self, question, answer), fields(question = %question.id, kind = ?question.question_type))]
  pub async fn assess(&self, question: &Question, answer: &RawAnswer) -> Result<AssessmentVerdict, EngineError> {
    validate_answer(question, answer)?;

    let verdict = match question.question_type {
      QuestionType::MultipleChoice => verdict_of(grade_multiple_choice(question, answer.as_text()?)),
      QuestionType::FillIn => verdict_of(grade_fill_in(question, answer.as_text()?)),
      QuestionType::Essay => {
        let grade = self.remote_grade(GradingRubric::Essay, &question.prompt.text, answer.as_text()?).await?;
        self.verdict_from_grade(grade, None)
      }
      QuestionType::Voice => {
        let (bytes, format) = answer.as_audio()?;
        self.assess_voice(question, bytes, format).await?
      }
      QuestionType::Writing => verdict_of(answer.as_completion()?),
    };

    info!(target: "grading", question = %question.id, correct = verdict.is_correct, grade = ?verdict.grade, "Answer assessed");
    Ok(verdict)
  }

  async fn assess_voice(&self, question: &Question, audio: &[u8], format: AudioFormat) -> Result<AssessmentVerdict, EngineError> {
    let transcript = with_timeout(self.speech_timeout, async {
      self.transcriber.transcribe(audio, format).await.map_err(GradingError::from)
    })
    .await?;
    debug!(target: "grading", confidence = transcript.confidence, transcript_len = transcript.text.len(), "Voice transcript");

    if normalize_spoken(&transcript.text) == normalize_spoken(&question.prompt.text) {
      return Ok(AssessmentVerdict { is_correct: true, transcript: Some(transcript.text), ..Default::default() });
    }
    let grade = self.remote_grade(GradingRubric::Speech, &question.prompt.text, &transcript.text).await?;
    Ok(self.verdict_from_grade(grade, Some(transcript.text)))
  }

  async fn remote_grade(&self, rubric: GradingRubric, prompt: &str, text: &str) -> Result<Grade, EngineError> {
    let grade = with_timeout(self.grading_timeout, self.grader.grade(rubric, prompt, text)).await?;
    Ok(grade)
  }

  fn verdict_from_grade(&self, grade: Grade, transcript: Option<String>) -> AssessmentVerdict {
    AssessmentVerdict {
      is_correct: grade.score >= self.pass_threshold,
      suggestion: Some(grade.suggestion).filter(|s| !s.is_empty()),
      grade: Some(grade.score),
      transcript,
    }
  }
}

fn verdict_of(correct: bool) -> AssessmentVerdict {
  if correct { AssessmentVerdict::correct() } else { AssessmentVerdict::incorrect() }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, GradingError>
where
  F: Future<Output = Result<T, GradingError>>,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(res) => res,
    Err(_) => {
      error!(target: "grading", ?limit, "Remote grading timed out");
      Err(GradingError::Timeout(limit))
    }
  }
}
