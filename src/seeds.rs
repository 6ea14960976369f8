//! Built-in courses so the engine is usable without any config file.

use crate::config::{CourseCfg, QuestionCfg};
use crate::domain::{CourseKind, PromptKind, QuestionType};

fn q(id: &str, question_type: QuestionType, prompt: &str) -> QuestionCfg {
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

fn mc(id: &str, prompt: &str, options: [&str; 4], correct: usize) -> QuestionCfg {
  QuestionCfg {
    options: options.iter().map(|s| s.to_string()).collect(),
    correct_option: Some(correct),
    ..q(id, QuestionType::MultipleChoice, prompt)
  }
}

fn fill(id: &str, prompt: &str, accepted: &[&str]) -> QuestionCfg {
  QuestionCfg {
    accepted: accepted.iter().map(|s| s.to_string()).collect(),
    ..q(id, QuestionType::FillIn, prompt)
  }
}

/// Minimal set of built-in courses (French + Spanish) covering every question type.
pub fn seed_courses() -> Vec<CourseCfg> {
  vec![
    CourseCfg {
      id: "fr-basics-1".into(),
      language: "fr".into(),
      kind: CourseKind::Standard,
      title: "French basics: greetings".into(),
      questions: vec![
        mc("fr-b1-q1", "How do you say \"good evening\"?", ["Bonjour", "Bonsoir", "Salut", "Merci"], 1),
        fill("fr-b1-q2", "Je ___ étudiant. (to be)", &["suis"]),
        q("fr-b1-q3", QuestionType::Essay, "Présentez-vous en trois phrases."),
        q("fr-b1-q4", QuestionType::Voice, "Je m'appelle Marie."),
        q("fr-b1-q5", QuestionType::Writing, "é"),
      ],
    },
    CourseCfg {
      id: "fr-daily-1".into(),
      language: "fr".into(),
      kind: CourseKind::Daily,
      title: "Daily challenge: café".into(),
      questions: vec![
        mc("fr-d1-q1", "\"Un café, s'il vous plaît\" means…", ["A tea, please", "A coffee, please", "The bill, please", "Water, please"], 1),
        fill("fr-d1-q2", "L'addition, s'il vous ___.", &["plaît", "plait"]),
      ],
    },
    CourseCfg {
      id: "fr-comp-1".into(),
      language: "fr".into(),
      kind: CourseKind::Comprehension,
      title: "Comprehension: au marché".into(),
      questions: vec![
        mc("fr-c1-q1", "Marie achète trois pommes et deux poires. Combien de fruits achète-t-elle ?", ["Trois", "Quatre", "Cinq", "Six"], 2),
        q("fr-c1-q2", QuestionType::Essay, "Résumez le texte en une phrase."),
      ],
    },
    CourseCfg {
      id: "es-daily-1".into(),
      language: "es".into(),
      kind: CourseKind::Daily,
      title: "Reto diario: saludos".into(),
      questions: vec![
        mc("es-d1-q1", "\"Buenas noches\" means…", ["Good morning", "Good afternoon", "Good night", "Goodbye"], 2),
        fill("es-d1-q2", "¿Cómo te ___? (llamarse)", &["llamas"]),
      ],
    },
  ]
}
