//! Session store: owns session records and the only legal transitions on them.
//!
//! The store does not check ownership, expiry or whether an answer really is
//! for the current question; the orchestrator does. What it guarantees:
//!   - `answered_questions` only grows, and never past `questions`
//!   - the score moves by a fixed increment per recorded answer
//!   - recording the same id twice in a row is a no-op (client retries)

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{CourseId, QuestionId, Session, UserId};
use crate::error::EngineError;

/// Points awarded per correct answer unless configured otherwise.
pub const SCORE_INCREMENT: u32 = 10;

/// Where a session stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurrentQuestion {
  Question(QuestionId),
  Completed,
}

/// `questions[len(answered_questions)]`, or `Completed` when out of range.
pub fn current_question_id(session: &Session) -> CurrentQuestion {
  match session.questions.get(session.answered_questions.len()) {
    Some(id) => CurrentQuestion::Question(id.clone()),
    None => CurrentQuestion::Completed,
  }
}

/// Append `question_id` and add `increment` to the score.
///
/// Returns false (and leaves the session untouched) when the id is already the
/// last answered entry or the session is complete.
pub fn apply_correct_answer(session: &mut Session, question_id: &str, increment: u32) -> bool {
  if session.is_complete() {
    return false;
  }
  if session.answered_questions.last().map(String::as_str) == Some(question_id) {
    return false;
  }
  session.answered_questions.push(question_id.to_string());
  session.score = session.score.saturating_add(increment);
  session.version += 1;
  true
}

/// Inputs for a fresh session.
#[derive(Clone, Debug)]
pub struct NewSession {
  pub user_id: UserId,
  pub course_id: CourseId,
  pub questions: Vec<QuestionId>,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  /// Always succeeds; score starts at 0 and nothing is answered.
  async fn create_session(&self, new: NewSession) -> Session;

  async fn get_session(&self, session_id: &str) -> Result<Session, EngineError>;

  async fn record_correct_answer(&self, session_id: &str, question_id: &str) -> Result<Session, EngineError>;

  /// Drop sessions whose expiry is before `cutoff`. Returns how many were removed.
  async fn purge_expired(&self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Clone)]
pub struct InMemorySessionStore {
  sessions: Arc<RwLock<HashMap<String, Session>>>,
  score_increment: u32,
}

impl Default for InMemorySessionStore {
  fn default() -> Self {
    Self::new(SCORE_INCREMENT)
  }
}

impl InMemorySessionStore {
  pub fn new(score_increment: u32) -> Self {
    Self { sessions: Arc::new(RwLock::new(HashMap::new())), score_increment }
  }

  pub async fn len(&self) -> usize {
    self.sessions.read().await.len()
  }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
  #[instrument(level = "debug", skip(self, new), fields(user = %new.user_id, course = %new.course_id, questions = new.questions.len()))]
  async fn create_session(&self, new: NewSession) -> Session {
    let session = Session {
      id: Uuid::new_v4().to_string(),
      user_id: new.user_id,
      course_id: new.course_id,
      questions: new.questions,
      answered_questions: Vec::new(),
      score: 0,
      created_at: new.created_at,
      expires_at: new.expires_at,
      version: 0,
    };
    self.sessions.write().await.insert(session.id.clone(), session.clone());
    info!(target: "session", id = %session.id, expires_at = %session.expires_at, "Session created");
    session
  }

  async fn get_session(&self, session_id: &str) -> Result<Session, EngineError> {
    self
      .sessions
      .read()
      .await
      .get(session_id)
      .cloned()
      .ok_or_else(|| EngineError::session_not_found(session_id))
  }

  #[instrument(level = "debug", skip(self))]
  async fn record_correct_answer(&self, session_id: &str, question_id: &str) -> Result<Session, EngineError> {
    let mut sessions = self.sessions.write().await;
    let session = sessions
      .get_mut(session_id)
      .ok_or_else(|| EngineError::session_not_found(session_id))?;
    if apply_correct_answer(session, question_id, self.score_increment) {
      debug!(target: "session", id = %session_id, %question_id, score = session.score, "Correct answer recorded");
    } else {
      debug!(target: "session", id = %session_id, %question_id, "Duplicate or late answer ignored");
    }
    Ok(session.clone())
  }

  async fn purge_expired(&self, cutoff: DateTime<Utc>) -> usize {
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, s| s.expires_at >= cutoff);
    before - sessions.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn new_session(questions: &[&str]) -> NewSession {
    let now = Utc::now();
    NewSession {
      user_id: "u1".into(),
      course_id: "c1".into(),
      questions: questions.iter().map(|s| s.to_string()).collect(),
      created_at: now,
      expires_at: now + Duration::minutes(30),
    }
  }

  #[tokio::test]
  async fn create_starts_empty_with_first_question_current() {
    let store = InMemorySessionStore::default();
    let s = store.create_session(new_session(&["q1", "q2"])).await;
    assert_eq!(s.score, 0);
    assert!(s.answered_questions.is_empty());
    assert_eq!(current_question_id(&s), CurrentQuestion::Question("q1".into()));
    assert_eq!(store.get_session(&s.id).await.expect("stored"), s);
  }

  #[tokio::test]
  async fn answering_every_question_completes_the_session() {
    let store = InMemorySessionStore::default();
    let questions = ["q1", "q2", "q3"];
    let s = store.create_session(new_session(&questions)).await;
    let mut last = s.clone();
    for q in questions {
      assert_eq!(current_question_id(&last), CurrentQuestion::Question(q.into()));
      last = store.record_correct_answer(&s.id, q).await.expect("record");
    }
    assert_eq!(current_question_id(&last), CurrentQuestion::Completed);
    assert_eq!(last.score, 30);
    assert_eq!(last.answered_questions, last.questions);
    assert_eq!(last.version, 3);
  }

  #[tokio::test]
  async fn repeated_record_for_same_question_scores_once() {
    let store = InMemorySessionStore::default();
    let s = store.create_session(new_session(&["q1", "q2"])).await;
    store.record_correct_answer(&s.id, "q1").await.expect("first");
    let s = store.record_correct_answer(&s.id, "q1").await.expect("retry");
    assert_eq!(s.score, 10);
    assert_eq!(s.answered_questions, vec!["q1".to_string()]);
  }

  #[tokio::test]
  async fn never_records_past_the_last_question() {
    let store = InMemorySessionStore::default();
    let s = store.create_session(new_session(&["q1"])).await;
    store.record_correct_answer(&s.id, "q1").await.expect("q1");
    let s = store.record_correct_answer(&s.id, "q9").await.expect("late");
    assert_eq!(s.answered_questions.len(), 1);
    assert!(s.answered_questions.len() <= s.questions.len());
    assert_eq!(s.score, 10);
  }

  #[tokio::test]
  async fn unknown_session_is_not_found() {
    let store = InMemorySessionStore::default();
    assert!(matches!(store.get_session("missing").await, Err(EngineError::NotFound { .. })));
    assert!(matches!(store.record_correct_answer("missing", "q1").await, Err(EngineError::NotFound { .. })));
  }

  #[tokio::test]
  async fn purge_drops_only_sessions_expired_before_cutoff() {
    let store = InMemorySessionStore::default();
    let mut old = new_session(&["q1"]);
    old.expires_at = Utc::now() - Duration::hours(2);
    store.create_session(old).await;
    let fresh = store.create_session(new_session(&["q1"])).await;

    let removed = store.purge_expired(Utc::now() - Duration::hours(1)).await;
    assert_eq!(removed, 1);
    assert_eq!(store.len().await, 1);
    assert!(store.get_session(&fresh.id).await.is_ok());
  }

  #[test]
  fn empty_question_list_is_immediately_complete() {
    let mut s = Session {
      id: "s".into(),
      user_id: "u".into(),
      course_id: "c".into(),
      questions: vec![],
      answered_questions: vec![],
      score: 0,
      created_at: Utc::now(),
      expires_at: Utc::now(),
      version: 0,
    };
    assert_eq!(current_question_id(&s), CurrentQuestion::Completed);
    assert!(!apply_correct_answer(&mut s, "q1", SCORE_INCREMENT));
  }
}
