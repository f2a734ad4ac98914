//! Transcoding boundary.
//!
//! A [`Transcoder`] consumes a readable byte stream, applies declarative
//! [`EncodeSettings`] and writes the result to a destination path. The
//! production implementation shells out to ffmpeg; simulations substitute
//! an in-memory codec with the same contract.

pub mod ffmpeg;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use ffmpeg::FfmpegTranscoder;

/// Declarative encode parameters for one job.
///
/// The bitrate is inherited from the source's first reported audio format;
/// codec, container and tag version are fixed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    /// Audio bitrate in kbit/s (None = [`Self::DEFAULT_AUDIO_BITRATE`])
    pub audio_bitrate: Option<u32>,
    /// Audio codec handed to the encoder
    pub audio_codec: String,
    /// Output container format
    pub container: String,
    /// ID3v2 tag version written into the output
    pub id3_version: u8,
}

impl EncodeSettings {
    /// Bitrate used when the source does not report one.
    pub const DEFAULT_AUDIO_BITRATE: u32 = 192;

    /// Settings inheriting the source's reported audio bitrate.
    pub fn with_audio_bitrate(audio_bitrate: Option<u32>) -> Self {
        Self {
            audio_bitrate,
            ..Self::default()
        }
    }

    /// The bitrate actually handed to the encoder.
    pub fn effective_bitrate(&self) -> u32 {
        self.audio_bitrate.unwrap_or(Self::DEFAULT_AUDIO_BITRATE)
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            audio_bitrate: None,
            audio_codec: "libmp3lame".to_string(),
            container: "mp3".to_string(),
            id3_version: 4,
        }
    }
}

/// Byte-stream-to-file audio codec.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encodes `input` into an audio file at `destination`.
    ///
    /// Consumes the stream to completion on success. The input is dropped
    /// before this returns, whatever the outcome.
    ///
    /// # Errors
    /// - `TranscodeError::BinaryNotFound` - Encoder binary missing
    /// - `TranscodeError::SpawnFailed` - Encoder could not be started
    /// - `TranscodeError::EncoderFailed` - Encoder reported an error
    /// - `TranscodeError::InputStalled` - Input stream went silent
    /// - `TranscodeError::Io` - Reading input or writing output failed
    async fn encode(
        &self,
        input: Box<dyn AsyncRead + Send + Unpin>,
        settings: &EncodeSettings,
        destination: &Path,
    ) -> Result<(), TranscodeError>;

    /// Checks whether the encoder is ready for use.
    fn is_available(&self) -> bool {
        true
    }
}

/// Errors that can occur during transcoding operations.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("encoder binary not found: {path}")]
    BinaryNotFound { path: String },

    #[error("failed to spawn encoder: {reason}")]
    SpawnFailed { reason: String },

    #[error("encoder failed: {reason}")]
    EncoderFailed { reason: String },

    #[error("input stream stalled: {reason}")]
    InputStalled { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
