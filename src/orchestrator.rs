//! Session orchestrator: the entry point tying catalog, store and assessment together.
//!
//! Owns the checks the store deliberately leaves out: ownership, expiry, and
//! "is this answer for the current question". Submissions for one session are
//! serialized by a per-session mutex held across grading and recording, so two
//! tabs cannot double-score the same question.
//!
//! Lives shown by clients are cosmetic; a wrong answer only leaves the
//! question current, it is never counted against the learner here.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::assessment::{AssessmentEngine, RawAnswer};
use crate::cache::{next_local_midnight, ExpiringCache};
use crate::catalog::QuestionCatalog;
use crate::clock::Clock;
use crate::config::SessionCfg;
use crate::domain::{AssessmentVerdict, CourseId, CourseKind, Question, QuestionId, Session};
use crate::error::EngineError;
use crate::store::{current_question_id, CurrentQuestion, NewSession, SessionStore};

/// How the question set for a new session is chosen. Session mechanics are
/// the same for every flavor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum SessionFlavor {
  /// A specific course level.
  Course {
    #[serde(rename = "courseId")]
    course_id: CourseId,
  },
  /// The language's course of the day, shared by all learners until local midnight.
  DailyChallenge { language: String },
  /// A randomly picked comprehension course.
  Comprehension { language: String },
}

/// The current question of a session, or the fact that there is none left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionView {
  Question(Question),
  Completed,
}

/// One answer submission.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
  pub answer: RawAnswer,
  /// The question the client believes it is answering. When set, a retry of
  /// an already-recorded answer is acknowledged without re-grading, and an
  /// answer for any other question is rejected as stale.
  pub question_id: Option<QuestionId>,
}

impl From<RawAnswer> for Submission {
  fn from(answer: RawAnswer) -> Self {
    Self { answer, question_id: None }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitOutcome {
  pub verdict: AssessmentVerdict,
  pub score: u32,
  pub is_complete: bool,
  pub answered: usize,
  pub total: usize,
  /// True when this was a retry of an answer that was already recorded.
  pub replayed: bool,
  pub next_question: Option<Question>,
}

pub struct SessionOrchestrator {
  catalog: Arc<dyn QuestionCatalog>,
  store: Arc<dyn SessionStore>,
  engine: AssessmentEngine,
  daily: ExpiringCache<String, CourseId>,
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
  clock: Clock,
  cfg: SessionCfg,
}

impl SessionOrchestrator {
  pub fn new(
    catalog: Arc<dyn QuestionCatalog>,
    store: Arc<dyn SessionStore>,
    engine: AssessmentEngine,
    cfg: SessionCfg,
  ) -> Self {
    Self {
      catalog,
      store,
      engine,
      daily: ExpiringCache::new(),
      locks: Mutex::new(HashMap::new()),
      clock: Clock::default(),
      cfg,
    }
  }

  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  #[instrument(level = "info", skip(self), fields(%user_id))]
  pub async fn start_session(&self, user_id: &str, flavor: SessionFlavor) -> Result<Session, EngineError> {
    let now = self.clock.now();
    let (course_id, expires_at) = match &flavor {
      SessionFlavor::Course { course_id } => (course_id.clone(), self.on_demand_expiry(now)),
      SessionFlavor::DailyChallenge { language } => {
        let course_id = self.daily_course(language, now).await?;
        (course_id, next_local_midnight(now, self.cfg.daily_utc_offset_minutes))
      }
      SessionFlavor::Comprehension { language } => {
        let course_id = self.random_course(language, CourseKind::Comprehension).await?;
        (course_id, self.on_demand_expiry(now))
      }
    };

    let questions = self.catalog.ordered_questions(&course_id).await?;
    let session = self
      .store
      .create_session(NewSession { user_id: user_id.to_string(), course_id, questions, created_at: now, expires_at })
      .await;
    info!(target: "session", id = %session.id, course = %session.course_id, ?flavor, total = session.questions.len(), "Session started");
    Ok(session)
  }

  /// Fetch a session the caller owns.
  pub async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Session, EngineError> {
    let session = self.store.get_session(session_id).await?;
    if !session.is_owned_by(user_id) {
      warn!(target: "session", id = %session_id, %user_id, "Access to foreign session refused");
      return Err(EngineError::Forbidden);
    }
    Ok(session)
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn current_question(&self, user_id: &str, session_id: &str) -> Result<QuestionView, EngineError> {
    let session = self.get_session(user_id, session_id).await?;
    self.view_of(&session).await
  }

  #[instrument(level = "info", skip(self, submission), fields(%user_id, %session_id))]
  pub async fn submit_answer(
    &self,
    user_id: &str,
    session_id: &str,
    submission: Submission,
  ) -> Result<SubmitOutcome, EngineError> {
    // Unknown or foreign ids are refused before a lock entry is created for them.
    self.get_session(user_id, session_id).await?;
    let lock = self.session_lock(session_id);
    let _guard = lock.lock().await;

    let session = self.get_session(user_id, session_id).await?;
    if let Some(claimed) = &submission.question_id {
      if session.answered_questions.last() == Some(claimed) {
        info!(target: "session", id = %session_id, question = %claimed, "Replayed submission acknowledged");
        return self.outcome(session, AssessmentVerdict::correct(), true).await;
      }
    }
    if session.is_expired(self.clock.now()) {
      return Err(EngineError::SessionExpired { expires_at: session.expires_at });
    }
    let question_id = match current_question_id(&session) {
      CurrentQuestion::Question(id) => id,
      CurrentQuestion::Completed => return Err(EngineError::Conflict("session already completed".into())),
    };
    if let Some(claimed) = &submission.question_id {
      if *claimed != question_id {
        return Err(EngineError::Conflict(format!("answer is for '{claimed}' but the current question is '{question_id}'")));
      }
    }

    let question = self.catalog.question(&question_id).await?;
    let verdict = self.engine.assess(&question, &submission.answer).await?;

    let session = if verdict.is_correct {
      self.store.record_correct_answer(session_id, &question_id).await?
    } else {
      session
    };
    info!(target: "session", id = %session_id, question = %question_id, correct = verdict.is_correct, score = session.score, "Submission processed");
    self.outcome(session, verdict, false).await
  }

  /// Drop sessions that expired longer ago than the configured grace period.
  pub async fn sweep_expired(&self) -> usize {
    let cutoff = shift_minutes(self.clock.now(), self.cfg.sweep_grace_minutes.saturating_neg());
    let removed = self.store.purge_expired(cutoff).await;
    if let Ok(mut locks) = self.locks.lock() {
      locks.retain(|_, l| Arc::strong_count(l) > 1);
    }
    if removed > 0 {
      info!(target: "session", removed, %cutoff, "Expired sessions swept");
    }
    removed
  }

  fn on_demand_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    shift_minutes(now, self.cfg.duration_minutes)
  }

  async fn daily_course(&self, language: &str, now: DateTime<Utc>) -> Result<CourseId, EngineError> {
    let key = language.trim().to_lowercase();
    let offset = self.cfg.daily_utc_offset_minutes;
    self
      .daily
      .get_or_regenerate(key.clone(), now, || async move {
        let course_id = self.random_course(&key, CourseKind::Daily).await?;
        info!(target: "session", language = %key, course = %course_id, "Daily challenge regenerated");
        Ok((course_id, next_local_midnight(now, offset)))
      })
      .await
  }

  async fn random_course(&self, language: &str, kind: CourseKind) -> Result<CourseId, EngineError> {
    let courses = self.catalog.courses(language, kind).await;
    courses
      .choose(&mut rand::thread_rng())
      .map(|c| c.id.clone())
      .ok_or_else(|| EngineError::NoCourseAvailable(language.to_string()))
  }

  fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = match self.locks.lock() {
      Ok(l) => l,
      Err(poisoned) => poisoned.into_inner(),
    };
    locks.entry(session_id.to_string()).or_default().clone()
  }

  async fn view_of(&self, session: &Session) -> Result<QuestionView, EngineError> {
    match current_question_id(session) {
      CurrentQuestion::Question(id) => Ok(QuestionView::Question(self.catalog.question(&id).await?)),
      CurrentQuestion::Completed => Ok(QuestionView::Completed),
    }
  }

  async fn outcome(&self, session: Session, verdict: AssessmentVerdict, replayed: bool) -> Result<SubmitOutcome, EngineError> {
    let next_question = match self.view_of(&session).await? {
      QuestionView::Question(q) => Some(q),
      QuestionView::Completed => None,
    };
    Ok(SubmitOutcome {
      verdict,
      score: session.score,
      is_complete: session.is_complete(),
      answered: session.answered_questions.len(),
      total: session.questions.len(),
      replayed,
      next_question,
    })
  }
}

/// `at` moved by `minutes`, clamped to the representable range.
fn shift_minutes(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
  Duration::try_minutes(minutes)
    .and_then(|delta| at.checked_add_signed(delta))
    .unwrap_or_else(|| {
      warn!(target: "session", minutes, "Time offset out of range, clamping");
      if minutes < 0 {
        DateTime::<Utc>::MIN_UTC
      } else {
        DateTime::<Utc>::MAX_UTC
      }
    })
}
