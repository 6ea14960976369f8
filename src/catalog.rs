//! Question catalog: the read-only source of courses and questions.
//!
//! The engine only reads from it. `InMemoryCatalog` is built once at startup
//! from the TOML bank plus built-in seeds.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::config::CourseCfg;
use crate::domain::{Course, CourseKind, Question, QuestionId};
use crate::error::EngineError;

#[async_trait]
pub trait QuestionCatalog: Send + Sync {
  /// Ordered, fixed list of question ids for a course.
  async fn ordered_questions(&self, course_id: &str) -> Result<Vec<QuestionId>, EngineError>;

  async fn question(&self, question_id: &str) -> Result<Question, EngineError>;

  /// Courses offered for a language and kind, in a stable order.
  async fn courses(&self, language: &str, kind: CourseKind) -> Vec<Course>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
  courses: HashMap<String, Course>,
  questions: HashMap<QuestionId, Question>,
}

impl InMemoryCatalog {
  /// Build from course entries. Earlier entries win on id clashes, so pass
  /// config courses before seeds.
  pub fn from_courses(entries: impl IntoIterator<Item = CourseCfg>) -> Self {
    let mut catalog = Self::default();
    for cfg in entries {
      if catalog.courses.contains_key(&cfg.id) {
        continue;
      }
      let mut question_ids = Vec::with_capacity(cfg.questions.len());
      for qc in cfg.questions {
        let qid = qc.id.clone();
        match qc.into_question() {
          Ok(q) => {
            question_ids.push(q.id.clone());
            catalog.questions.entry(q.id.clone()).or_insert(q);
          }
          Err(reason) => {
            error!(target: "session", course = %cfg.id, question = %qid, %reason, "Skipping bank question");
          }
        }
      }
      if question_ids.is_empty() {
        error!(target: "session", course = %cfg.id, "Skipping course without valid questions");
        continue;
      }
      let course = Course {
        id: cfg.id.clone(),
        language: cfg.language,
        kind: cfg.kind,
        title: cfg.title,
        question_ids,
      };
      catalog.courses.insert(cfg.id, course);
    }

    let mut inventory: HashMap<(String, CourseKind), usize> = HashMap::new();
    for c in catalog.courses.values() {
      *inventory.entry((c.language.clone(), c.kind)).or_default() += 1;
    }
    for ((language, kind), count) in inventory {
      info!(target: "session", %language, ?kind, count, "Startup course inventory");
    }
    catalog
  }

  pub fn course_count(&self) -> usize {
    self.courses.len()
  }
}

#[async_trait]
impl QuestionCatalog for InMemoryCatalog {
  #[instrument(level = "debug", skip(self))]
  async fn ordered_questions(&self, course_id: &str) -> Result<Vec<QuestionId>, EngineError> {
    self
      .courses
      .get(course_id)
      .map(|c| c.question_ids.clone())
      .ok_or_else(|| EngineError::course_not_found(course_id))
  }

  #[instrument(level = "debug", skip(self))]
  async fn question(&self, question_id: &str) -> Result<Question, EngineError> {
    self
      .questions
      .get(question_id)
      .cloned()
      .ok_or_else(|| EngineError::question_not_found(question_id))
  }

  async fn courses(&self, language: &str, kind: CourseKind) -> Vec<Course> {
    let mut out: Vec<Course> = self
      .courses
      .values()
      .filter(|c| c.kind == kind && c.language.eq_ignore_ascii_case(language))
      .cloned()
      .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::seed_courses;

  #[tokio::test]
  async fn seeds_are_served_in_authored_order() {
    let catalog = InMemoryCatalog::from_courses(seed_courses());
    let ids = catalog.ordered_questions("fr-basics-1").await.expect("course");
    assert_eq!(ids.first().map(String::as_str), Some("fr-b1-q1"));
    assert_eq!(ids.len(), 5);
    let q = catalog.question("fr-b1-q2").await.expect("question");
    assert_eq!(q.prompt.text, "Je ___ étudiant. (to be)");
  }

  #[tokio::test]
  async fn earlier_entries_win_and_unknown_ids_are_not_found() {
    let mut custom = seed_courses().remove(0);
    custom.title = "custom".into();
    custom.questions.truncate(1);
    let catalog = InMemoryCatalog::from_courses(std::iter::once(custom).chain(seed_courses()));
    assert_eq!(catalog.ordered_questions("fr-basics-1").await.expect("course").len(), 1);

    let err = catalog.ordered_questions("nope").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { what: "course", .. }));
  }

  #[tokio::test]
  async fn filters_courses_by_language_and_kind() {
    let catalog = InMemoryCatalog::from_courses(seed_courses());
    let daily = catalog.courses("FR", CourseKind::Daily).await;
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].id, "fr-daily-1");
    assert!(catalog.courses("de", CourseKind::Daily).await.is_empty());
  }
}
