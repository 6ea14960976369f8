//! Loading engine configuration (prompts, grading/session knobs, question bank) from TOML.
//!
//! See `AppConfig` for the expected schema. Every section is optional.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{CorrectAnswer, CourseKind, Prompt, PromptKind, Question, QuestionType};
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub grading: GradingCfg,
  #[serde(default)]
  pub session: SessionCfg,
  #[serde(default)]
  pub speech: SpeechCfg,
  #[serde(default)]
  pub courses: Vec<CourseCfg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GradingCfg {
  /// Remote scores at or above this count as correct.
  pub pass_threshold: u8,
  pub timeout_secs: u64,
  pub speech_timeout_secs: u64,
}

impl Default for GradingCfg {
  fn default() -> Self {
    Self { pass_threshold: 70, timeout_secs: 20, speech_timeout_secs: 45 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
  pub duration_minutes: i64,
  /// Offset from UTC used to find "local midnight" for daily challenges.
  pub daily_utc_offset_minutes: i32,
  pub sweep_interval_secs: u64,
  /// Expired sessions are kept this long before the sweep drops them.
  pub sweep_grace_minutes: i64,
  pub score_increment: u32,
}

impl Default for SessionCfg {
  fn default() -> Self {
    Self {
      duration_minutes: 30,
      daily_utc_offset_minutes: 0,
      sweep_interval_secs: 300,
      sweep_grace_minutes: 60,
      score_increment: 10,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechCfg {
  pub ffmpeg_path: String,
  pub blob_dir: PathBuf,
  pub sample_rate_hz: u32,
}

impl Default for SpeechCfg {
  fn default() -> Self {
    Self {
      ffmpeg_path: "ffmpeg".into(),
      blob_dir: std::env::temp_dir().join("lingua-backend-blobs"),
      sample_rate_hz: 16_000,
    }
  }
}

/// Course entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct CourseCfg {
  pub id: String,
  pub language: String,
  #[serde(default)] pub kind: CourseKind,
  #[serde(default)] pub title: String,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

/// Question entry nested under a course.
/// Only the answer key matching `type` needs to be filled.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub id: String,
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub prompt: String,
  #[serde(default)] pub prompt_kind: PromptKind,
  #[serde(default)] pub audio_url: Option<String>,
  // multiple_choice
  #[serde(default)] pub options: Vec<String>,
  #[serde(default)] pub correct_option: Option<usize>,
  // fill_in
  #[serde(default)] pub accepted: Vec<String>,
  #[serde(default)] pub uses_ai: Option<bool>,
}

impl QuestionCfg {
  /// Build the catalog entry, rejecting answer keys that cannot be graded.
  pub fn into_question(self) -> Result<Question, String> {
    let correct_answer = match self.question_type {
      QuestionType::MultipleChoice => {
        let index = self.correct_option.ok_or("multiple_choice needs correct_option")?;
        if index >= self.options.len() {
          return Err(format!("correct_option {} out of range ({} options)", index, self.options.len()));
        }
        CorrectAnswer::OptionIndex { index }
      }
      QuestionType::FillIn => {
        if self.accepted.is_empty() {
          return Err("fill_in needs at least one accepted answer".into());
        }
        CorrectAnswer::Accepted { values: self.accepted }
      }
      QuestionType::Essay | QuestionType::Voice | QuestionType::Writing => CorrectAnswer::Graded,
    };
    let uses_ai = self.uses_ai.unwrap_or_else(|| self.question_type.is_remote());
    Ok(Question {
      id: self.id,
      question_type: self.question_type,
      prompt: Prompt { kind: self.prompt_kind, text: self.prompt, audio_url: self.audio_url },
      answer_options: self.options,
      correct_answer,
      uses_ai,
    })
  }
}

/// Prompts used by the AI grader. Placeholders: `{prompt}`, `{answer}`, `{expected}`, `{transcript}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub essay_system: String,
  pub essay_user_template: String,
  pub speech_system: String,
  pub speech_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      essay_system: "You are a language teacher grading a learner's short written answer. Respond ONLY with strict JSON.".into(),
      essay_user_template: "Task: {prompt}\nLearner answer: {answer}\n\nReturn JSON {\"suggestion\": string, \"score\": integer}. score is 0-100 for how well the answer fulfils the task in correct language. suggestion is one or two sentences of feedback for the learner.".into(),
      speech_system: "You are a pronunciation coach comparing a speech transcript with a target sentence. Respond ONLY with strict JSON.".into(),
      speech_user_template: "Target sentence: {expected}\nTranscript of the learner: {transcript}\n\nReturn JSON {\"suggestion\": string, \"score\": integer}. score is 0-100 for how closely the learner said the target sentence; ignore casing and punctuation. suggestion names the words to practise.".into(),
    }
  }
}

/// Read and parse a TOML config file.
pub fn load_app_config(path: &str) -> Result<AppConfig, ConfigError> {
  let raw = std::fs::read_to_string(path)
    .map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
  toml::from_str::<AppConfig>(&raw)
    .map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

/// Load `AppConfig` from ENGINE_CONFIG_PATH. On any IO/parse error, logs and falls back to defaults.
pub fn load_app_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("ENGINE_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match load_app_config(&path) {
    Ok(cfg) => {
      info!(target: "lingua_backend", %path, courses = cfg.courses.len(), "Loaded engine config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "lingua_backend", %path, error = %e, "Failed to load engine config; using defaults");
      AppConfig::default()
    }
  }
}
