//! Typed notifications emitted by the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::progress::ProgressSnapshot;
use crate::source::ResourceId;

/// Phase of a job execution in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Resolving metadata for the resource id
    MetadataResolution,
    /// Opening the byte stream for the chosen quality
    StreamOpen,
    /// The open stream went silent past the inactivity window
    StreamStalled,
    /// Encoding the stream into the output file
    Transcode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::MetadataResolution => write!(f, "metadata-resolution"),
            Stage::StreamOpen => write!(f, "stream-open"),
            Stage::StreamStalled => write!(f, "stream-stalled"),
            Stage::Transcode => write!(f, "transcode"),
        }
    }
}

/// Terminal record of one successfully completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    /// The id the job was submitted for
    pub resource_id: ResourceId,
    /// Canonical URL the stream was fetched from
    pub source_url: String,
    /// Path of the written audio file
    pub output_path: PathBuf,
    /// Final transfer statistics; absent when the stream finished before
    /// any snapshot fired (stats are best-effort, never required)
    pub stats: Option<ProgressSnapshot>,
}

/// Terminal record of one failed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    /// The id the job was submitted for
    pub resource_id: ResourceId,
    /// Phase the execution failed in
    pub stage: Stage,
    /// Human-readable message from the failing collaborator
    pub reason: String,
}

/// Notifications delivered to pipeline subscribers.
///
/// Within one job, progress events precede its terminal event; events of
/// different jobs interleave arbitrarily.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Running plus pending job count after an admission or completion
    QueueDepth { depth: usize },
    /// Transfer progress for one job's stream
    Progress {
        resource_id: ResourceId,
        snapshot: ProgressSnapshot,
    },
    /// A job reached its successful terminal state
    Completed(JobResult),
    /// A job reached its failed terminal state
    Failed(JobFailure),
}
