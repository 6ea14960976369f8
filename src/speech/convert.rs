//! Audio conversion to the canonical encoding via an external `ffmpeg` binary.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{AudioConverter, AudioFormat};
use crate::error::TranscriptionError;

/// Converts uploads to mono 16-bit PCM WAV at `sample_rate_hz`.
///
/// Input goes through a named temp file rather than stdin: mp4/m4a
/// containers need a seekable input.
#[derive(Clone, Debug)]
pub struct FfmpegConverter {
  pub ffmpeg_path: String,
  pub sample_rate_hz: u32,
}

impl FfmpegConverter {
  pub fn new(ffmpeg_path: impl Into<String>, sample_rate_hz: u32) -> Self {
    Self { ffmpeg_path: ffmpeg_path.into(), sample_rate_hz }
  }

  fn args(&self, input: &str) -> Vec<String> {
    vec![
      "-hide_banner".into(),
      "-loglevel".into(),
      "error".into(),
      "-i".into(),
      input.into(),
      "-ac".into(),
      "1".into(),
      "-ar".into(),
      self.sample_rate_hz.to_string(),
      "-sample_fmt".into(),
      "s16".into(),
      "-f".into(),
      "wav".into(),
      "pipe:1".into(),
    ]
  }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
  #[instrument(level = "debug", skip(self, audio), fields(audio_len = audio.len(), ?format))]
  async fn to_canonical(&self, audio: &[u8], format: AudioFormat) -> Result<Vec<u8>, TranscriptionError> {
    if audio.is_empty() {
      return Err(TranscriptionError::Conversion("empty audio".into()));
    }
    if format == AudioFormat::Wav {
      return Ok(audio.to_vec());
    }

    let input = tempfile::Builder::new()
      .prefix("lingua-upload-")
      .suffix(&format!(".{}", format.extension()))
      .tempfile()
      .map_err(|e| TranscriptionError::Conversion(format!("temp file: {e}")))?;
    tokio::fs::write(input.path(), audio)
      .await
      .map_err(|e| TranscriptionError::Conversion(format!("temp write: {e}")))?;

    let input_path = input.path().to_string_lossy().to_string();
    let output = Command::new(&self.ffmpeg_path)
      .args(self.args(&input_path))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|e| TranscriptionError::Conversion(format!("spawn {}: {e}", self.ffmpeg_path)))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(TranscriptionError::Conversion(format!(
        "ffmpeg exited with {}: {}",
        output.status,
        crate::util::trunc_for_log(stderr.trim(), 300)
      )));
    }
    if output.stdout.is_empty() {
      return Err(TranscriptionError::Conversion("ffmpeg produced no output".into()));
    }
    debug!(target: "speech", out_len = output.stdout.len(), "ffmpeg conversion finished");
    Ok(output.stdout)
  }
}
