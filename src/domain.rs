//! Domain models: questions, courses, sessions and verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type QuestionId = String;
pub type CourseId = String;
pub type SessionId = String;
pub type UserId = String;

/// The closed set of question kinds. Grading is dispatched on this tag.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  /// Pick one of four options; graded locally.
  MultipleChoice,
  /// Free text graded by the AI text grader.
  Essay,
  /// Short typed answer; graded locally against the accepted strings.
  FillIn,
  /// Spoken answer; transcribed, then compared or graded.
  Voice,
  /// Handwriting practice; the client reports completion.
  Writing,
}

impl QuestionType {
  /// True for the kinds that need a remote round trip to grade.
  pub fn is_remote(self) -> bool {
    matches!(self, QuestionType::Essay | QuestionType::Voice)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
  #[default]
  Text,
  Audio,
  Image,
}

/// What the learner sees (or hears) for a question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Prompt {
  #[serde(default)] pub kind: PromptKind,
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub audio_url: Option<String>,
}

/// Type-dependent answer key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectAnswer {
  /// Zero-based index into `answer_options` (MultipleChoice).
  OptionIndex { index: usize },
  /// Acceptable strings (FillIn). Only the first one is authoritative.
  Accepted { values: Vec<String> },
  /// Essay, Voice and Writing are graded, not matched.
  Graded,
}

/// Immutable catalog entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
  pub id: QuestionId,
  pub question_type: QuestionType,
  pub prompt: Prompt,
  #[serde(default)] pub answer_options: Vec<String>,
  pub correct_answer: CorrectAnswer,
  /// Informational only; dispatch goes by `question_type`.
  #[serde(default)] pub uses_ai: bool,
}

/// How a course is offered to learners.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseKind {
  #[default]
  Standard,
  Daily,
  Comprehension,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
  pub id: CourseId,
  pub language: String,
  pub kind: CourseKind,
  #[serde(default)] pub title: String,
  pub question_ids: Vec<QuestionId>,
}

/// One attempt at a fixed, ordered set of questions.
///
/// The current question is always `questions[answered_questions.len()]`;
/// there is no separate cursor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
  pub id: SessionId,
  pub user_id: UserId,
  pub course_id: CourseId,
  pub questions: Vec<QuestionId>,
  pub answered_questions: Vec<QuestionId>,
  pub score: u32,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  /// Bumped on every successful append.
  pub version: u64,
}

impl Session {
  pub fn is_complete(&self) -> bool {
    self.answered_questions.len() >= self.questions.len()
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }

  pub fn is_owned_by(&self, user_id: &str) -> bool {
    self.user_id == user_id
  }
}

/// Transient outcome of grading one answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct AssessmentVerdict {
  pub is_correct: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
  /// Grader score (0-100) when a remote grader produced the verdict.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grade: Option<u8>,
  /// What the recognizer heard, for Voice questions.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transcript: Option<String>,
}

impl AssessmentVerdict {
  pub fn correct() -> Self {
    Self { is_correct: true, ..Default::default() }
  }

  pub fn incorrect() -> Self {
    Self::default()
  }
}
