//! Spindrift Core - Concurrent audio extraction and transcoding
//!
//! This crate provides the building blocks for turning remote audio/video
//! resources into local mp3 files: a bounded-parallelism job scheduler,
//! transfer progress metering, collaborator traits for source acquisition
//! and transcoding, and production implementations backed by plain HTTP
//! and an ffmpeg subprocess.

pub mod config;
pub mod filename;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod transcode;

// Re-export main types for convenient access
pub use config::PipelineConfig;
pub use filename::sanitize_file_name;
pub use pipeline::{
    JobFailure, JobResult, PipelineError, PipelineEvent, PipelineHandle, Stage, spawn_pipeline,
};
pub use progress::ProgressSnapshot;
pub use source::{
    AudioFormat, HttpSourceProvider, MediaStream, QualityProfile, ResourceId, SourceError,
    SourceMetadata, SourceProvider,
};
pub use transcode::{EncodeSettings, FfmpegTranscoder, TranscodeError, Transcoder};

/// Core errors that can bubble up from any Spindrift subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum SpindriftError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpindriftError>;
