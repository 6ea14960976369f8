//! Application state: wires the catalog, session store, graders and orchestrator.
//!
//! This module owns startup selection of the grading backends:
//!   - OpenAI present: AI text grader + ffmpeg/blob/OpenAI speech pipeline
//!   - OpenAI absent: `Unconfigured`, so Essay/Voice answers surface
//!     "grading unavailable" while local question types keep working

use std::{sync::Arc, time::Duration};

use tracing::{info, instrument};

use crate::assessment::{AssessmentEngine, TextGrader, Unconfigured};
use crate::catalog::InMemoryCatalog;
use crate::config::{load_app_config_from_env, AppConfig};
use crate::openai::{OpenAI, OpenAiRecognizer};
use crate::orchestrator::SessionOrchestrator;
use crate::seeds::seed_courses;
use crate::speech::{BlobStore, FfmpegConverter, LocalBlobStore, Transcriber, TranscriptionPipeline};
use crate::store::InMemorySessionStore;

#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<SessionOrchestrator>,
  pub sweep_interval: Duration,
  pub course_count: usize,
}

impl AppState {
  /// Build state from env: load config, build catalog and store, init OpenAI.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg = load_app_config_from_env();

    let request_timeout = Duration::from_secs(cfg.grading.timeout_secs.max(cfg.grading.speech_timeout_secs) + 5);
    let openai = OpenAI::from_env(cfg.prompts.clone(), request_timeout);
    let (grader, transcriber): (Arc<dyn TextGrader>, Arc<dyn Transcriber>) = match openai {
      Some(oa) => {
        info!(target: "lingua_backend", base_url = %oa.base_url, grading_model = %oa.grading_model, transcribe_model = %oa.transcribe_model, "OpenAI enabled.");
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(cfg.speech.blob_dir.clone()));
        let pipeline = TranscriptionPipeline::new(
          Arc::new(FfmpegConverter::new(cfg.speech.ffmpeg_path.clone(), cfg.speech.sample_rate_hz)),
          blobs.clone(),
          Arc::new(OpenAiRecognizer::new(oa.clone(), blobs)),
        );
        let grader: Arc<dyn TextGrader> = Arc::new(oa);
        let transcriber: Arc<dyn Transcriber> = Arc::new(pipeline);
        (grader, transcriber)
      }
      None => {
        info!(target: "lingua_backend", "OpenAI disabled (no OPENAI_API_KEY). Essay and voice grading unavailable.");
        let grader: Arc<dyn TextGrader> = Arc::new(Unconfigured);
        let transcriber: Arc<dyn Transcriber> = Arc::new(Unconfigured);
        (grader, transcriber)
      }
    };

    Self::from_parts(&cfg, grader, transcriber)
  }

  /// Build state around the given graders. Config courses win over seeds on id clashes.
  pub fn from_parts(cfg: &AppConfig, grader: Arc<dyn TextGrader>, transcriber: Arc<dyn Transcriber>) -> Self {
    let catalog = InMemoryCatalog::from_courses(cfg.courses.iter().cloned().chain(seed_courses()));
    let course_count = catalog.course_count();
    info!(target: "lingua_backend", courses = course_count, "Catalog ready");

    let store = InMemorySessionStore::new(cfg.session.score_increment);
    let engine = AssessmentEngine::new(grader, transcriber, &cfg.grading);
    let orchestrator = SessionOrchestrator::new(Arc::new(catalog), Arc::new(store), engine, cfg.session.clone());

    Self {
      orchestrator: Arc::new(orchestrator),
      sweep_interval: Duration::from_secs(cfg.session.sweep_interval_secs.max(1)),
      course_count,
    }
  }
}
