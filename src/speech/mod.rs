//! Speech transcription pipeline.
//!
//! Four stages, one fallible operation from the caller's point of view:
//!   1) convert the upload to canonical audio (16 kHz mono PCM WAV)
//!   2) put it in blob storage
//!   3) ask the recognizer for alternatives and keep the best one
//!   4) delete the blob
//!
//! Stage 4 runs on every exit path. `TempBlob` deletes on `release`, and if
//! the future is dropped first (timeout, client gone) its `Drop` spawns the
//! delete instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::TranscriptionError;

pub mod blob;
pub mod convert;

pub use blob::LocalBlobStore;
pub use convert::FfmpegConverter;

pub const CANONICAL_CONTENT_TYPE: &str = "audio/wav";

/// Source encodings accepted from clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
  Webm,
  Ogg,
  Mp3,
  M4a,
  Wav,
}

impl AudioFormat {
  /// Parse a MIME type (`audio/webm;codecs=opus`) or a bare extension (`m4a`).
  pub fn parse(s: &str) -> Option<Self> {
    let base = s.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let sub = base.rsplit('/').next().unwrap_or_default();
    match sub {
      "webm" => Some(Self::Webm),
      "ogg" | "opus" | "oga" => Some(Self::Ogg),
      "mpeg" | "mp3" => Some(Self::Mp3),
      "mp4" | "m4a" | "x-m4a" | "aac" => Some(Self::M4a),
      "wav" | "wave" | "x-wav" | "vnd.wave" => Some(Self::Wav),
      _ => None,
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      Self::Webm => "webm",
      Self::Ogg => "ogg",
      Self::Mp3 => "mp3",
      Self::M4a => "m4a",
      Self::Wav => "wav",
    }
  }
}

/// Best transcript the recognizer produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
  pub text: String,
  pub confidence: f64,
}

/// Addressable location of a stored blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobRef {
  pub key: String,
  pub uri: String,
}

/// What the Assessment Engine sees: audio in, transcript out.
#[async_trait]
pub trait Transcriber: Send + Sync {
  async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<Transcript, TranscriptionError>;
}

#[async_trait]
pub trait AudioConverter: Send + Sync {
  async fn to_canonical(&self, audio: &[u8], format: AudioFormat) -> Result<Vec<u8>, TranscriptionError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
  /// Store `bytes` under a caller-chosen `key`.
  async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, TranscriptionError>;
  async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, TranscriptionError>;
  /// Deleting a blob that is already gone (or was never written) is not an error.
  async fn delete(&self, key: &str) -> Result<(), TranscriptionError>;
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
  /// Candidate transcripts, in any order.
  async fn recognize(&self, blob: &BlobRef) -> Result<Vec<Transcript>, TranscriptionError>;
}

/// Pick the highest-confidence non-empty alternative.
pub fn best_alternative(alternatives: Vec<Transcript>) -> Result<Transcript, TranscriptionError> {
  alternatives
    .into_iter()
    .map(|t| Transcript { text: t.text.trim().to_string(), confidence: t.confidence })
    .filter(|t| !t.text.is_empty())
    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    .ok_or(TranscriptionError::EmptyTranscript)
}

/// A blob key owned by exactly one transcription call.
///
/// Armed before the upload starts, so a call cancelled mid-upload still
/// deletes whatever got written.
struct TempBlob {
  store: Arc<dyn BlobStore>,
  key: Option<String>,
}

impl TempBlob {
  fn new(store: Arc<dyn BlobStore>, key: String) -> Self {
    Self { store, key: Some(key) }
  }

  async fn release(mut self) {
    if let Some(key) = self.key.take() {
      delete_logged(self.store.as_ref(), &key).await;
    }
  }
}

impl Drop for TempBlob {
  fn drop(&mut self) {
    let Some(key) = self.key.take() else { return };
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        let store = self.store.clone();
        handle.spawn(async move { delete_logged(store.as_ref(), &key).await });
      }
      Err(_) => warn!(target: "speech", %key, "No runtime to delete temporary blob"),
    }
  }
}

async fn delete_logged(store: &dyn BlobStore, key: &str) {
  match store.delete(key).await {
    Ok(()) => debug!(target: "speech", %key, "Temporary blob deleted"),
    Err(e) => warn!(target: "speech", %key, error = %e, "Failed to delete temporary blob"),
  }
}

pub struct TranscriptionPipeline {
  converter: Arc<dyn AudioConverter>,
  store: Arc<dyn BlobStore>,
  recognizer: Arc<dyn SpeechRecognizer>,
}

impl TranscriptionPipeline {
  pub fn new(
    converter: Arc<dyn AudioConverter>,
    store: Arc<dyn BlobStore>,
    recognizer: Arc<dyn SpeechRecognizer>,
  ) -> Self {
    Self { converter, store, recognizer }
  }
}

#[async_trait]
impl Transcriber for TranscriptionPipeline {
  #[instrument(level = "info", skip(self, audio), fields(audio_len = audio.len(), ?format))]
  async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<Transcript, TranscriptionError> {
    let canonical = self.converter.to_canonical(audio, format).await?;
    debug!(target: "speech", canonical_len = canonical.len(), "Audio converted");

    let key = format!("{}.{}", Uuid::new_v4(), AudioFormat::Wav.extension());
    let temp = TempBlob::new(self.store.clone(), key.clone());
    let recognized = match self.store.put(&key, canonical, CANONICAL_CONTENT_TYPE).await {
      Ok(blob) => self.recognizer.recognize(&blob).await,
      Err(e) => Err(e),
    };
    temp.release().await;

    let best = best_alternative(recognized?)?;
    info!(target: "speech", confidence = best.confidence, transcript_len = best.text.len(), "Transcription done");
    Ok(best)
  }
}
