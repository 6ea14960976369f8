//! Shared fixtures for lingua-backend integration tests.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use lingua_backend::assessment::{AssessmentEngine, Grade, GradingRubric, TextGrader, Unconfigured};
use lingua_backend::catalog::InMemoryCatalog;
use lingua_backend::clock::Clock;
use lingua_backend::config::{CourseCfg, GradingCfg, QuestionCfg, SessionCfg};
use lingua_backend::domain::{CourseKind, PromptKind, QuestionType};
use lingua_backend::error::{GradingError, TranscriptionError};
use lingua_backend::orchestrator::SessionOrchestrator;
use lingua_backend::speech::{AudioFormat, Transcriber, Transcript};
use lingua_backend::store::InMemorySessionStore;

pub const LEARNER: &str = "learner-1";
pub const OTHER: &str = "learner-2";

/// Grader that returns a fixed score after an optional delay.
pub struct ScriptedGrader {
  pub score: u8,
  pub delay: Duration,
}

#[async_trait]
impl TextGrader for ScriptedGrader {
  async fn grade(&self, _rubric: GradingRubric, _prompt: &str, _text: &str) -> Result<Grade, GradingError> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    Ok(Grade { score: self.score, suggestion: "Nice.".into() })
  }
}

#[allow(dead_code)]
pub fn grader(score: u8) -> Arc<dyn TextGrader> {
  Arc::new(ScriptedGrader { score, delay: Duration::ZERO })
}

#[allow(dead_code)]
pub fn slow_grader(score: u8, delay: Duration) -> Arc<dyn TextGrader> {
  Arc::new(ScriptedGrader { score, delay })
}

/// Transcriber that hears a fixed sentence, optionally after a delay.
pub struct ScriptedTranscriber {
  pub text: &'static str,
  pub delay: Duration,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
  async fn transcribe(&self, _audio: &[u8], _format: AudioFormat) -> Result<Transcript, TranscriptionError> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    Ok(Transcript { text: self.text.into(), confidence: 0.9 })
  }
}

#[allow(dead_code)]
pub fn hears(text: &'static str) -> Arc<dyn Transcriber> {
  Arc::new(ScriptedTranscriber { text, delay: Duration::ZERO })
}

#[allow(dead_code)]
pub fn slow_transcriber(delay: Duration) -> Arc<dyn Transcriber> {
  Arc::new(ScriptedTranscriber { text: "", delay })
}

fn question(id: &str, question_type: QuestionType, prompt: &str) -> QuestionCfg {
  QuestionCfg {
    id: id.into(),
    question_type,
    prompt: prompt.into(),
    prompt_kind: PromptKind::Text,
    audio_url: None,
    options: vec![],
    correct_option: None,
    accepted: vec![],
    uses_ai: None,
  }
}

fn course(id: &str, language: &str, kind: CourseKind, questions: Vec<QuestionCfg>) -> CourseCfg {
  CourseCfg { id: id.into(), language: language.into(), kind, title: id.into(), questions }
}

/// `trio`: Q1 multiple choice (b), Q2 fill-in (paris), Q3 essay.
/// `long`: five multiple-choice questions, all answered "yes".
/// `speak`: a voice question ("Je m'appelle Marie.") then a writing drill.
/// Two daily and one comprehension course for "fr".
pub fn courses() -> Vec<CourseCfg> {
  let mc = QuestionCfg {
    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
    correct_option: Some(1),
    ..question("Q1", QuestionType::MultipleChoice, "Pick b")
  };
  let fill = QuestionCfg { accepted: vec!["paris".into()], ..question("Q2", QuestionType::FillIn, "Capital of France?") };
  let essay = question("Q3", QuestionType::Essay, "Describe your town.");

  let yes = |id: &str| QuestionCfg {
    options: vec!["yes".into(), "no".into()],
    correct_option: Some(0),
    ..question(id, QuestionType::MultipleChoice, "Say yes")
  };

  vec![
    course("trio", "fr", CourseKind::Standard, vec![mc, fill, essay]),
    course(
      "speak",
      "fr",
      CourseKind::Standard,
      vec![question("V1", QuestionType::Voice, "Je m'appelle Marie."), question("W1", QuestionType::Writing, "é")],
    ),
    course("long", "fr", CourseKind::Standard, (1..=5).map(|i| yes(&format!("L{i}"))).collect()),
    course("daily-a", "fr", CourseKind::Daily, vec![yes("DA1")]),
    course("daily-b", "fr", CourseKind::Daily, vec![yes("DB1")]),
    course("comp-a", "fr", CourseKind::Comprehension, vec![yes("CA1"), yes("CA2")]),
  ]
}

/// 2030-03-14 10:00 UTC, far from any midnight.
#[allow(dead_code)]
pub fn morning() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2030, 3, 14, 10, 0, 0).single().expect("valid date")
}

#[allow(dead_code)]
pub fn orchestrator(grader: Arc<dyn TextGrader>, clock: Clock) -> SessionOrchestrator {
  orchestrator_with(grader, Arc::new(Unconfigured), clock)
}

#[allow(dead_code)]
pub fn orchestrator_with(grader: Arc<dyn TextGrader>, transcriber: Arc<dyn Transcriber>, clock: Clock) -> SessionOrchestrator {
  let catalog = InMemoryCatalog::from_courses(courses());
  let engine = AssessmentEngine::new(grader, transcriber, &GradingCfg::default());
  SessionOrchestrator::new(Arc::new(catalog), Arc::new(InMemorySessionStore::default()), engine, SessionCfg::default())
    .with_clock(clock)
}
