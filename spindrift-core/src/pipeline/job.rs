//! Per-job execution state machine.
//!
//! One job runs `resolve metadata → open stream → transcode` with a single
//! failure-mapping point per stage. Progress snapshots are relayed to the
//! event feed while the transcoder drains the metered stream; the final
//! 100% snapshot is folded into the eventual result.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::events::{JobFailure, PipelineEvent, Stage};
use crate::config::PipelineConfig;
use crate::progress::{ProgressMeter, ProgressSnapshot};
use crate::source::{ResourceId, SourceError, SourceProvider};
use crate::transcode::{EncodeSettings, TranscodeError, Transcoder};

/// One end-to-end request to fetch and transcode one resource.
///
/// Created at submission with the output path already resolved; owned by
/// the scheduler until its terminal event has been emitted.
#[derive(Debug, Clone)]
pub struct Job {
    /// Resource to fetch
    pub resource_id: ResourceId,
    /// Caller-supplied output file name, already sanitized
    pub file_name: String,
    /// Full destination path inside the configured output directory
    pub output_path: PathBuf,
}

/// Stage-tagged error terminating a job execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("metadata resolution failed: {0}")]
    MetadataResolution(SourceError),

    #[error("stream open failed: {0}")]
    StreamOpen(SourceError),

    #[error("stream stalled: {reason}")]
    StreamStalled { reason: String },

    #[error("transcode failed: {0}")]
    Transcode(TranscodeError),
}

impl JobError {
    /// The execution phase this error occurred in.
    pub fn stage(&self) -> Stage {
        match self {
            JobError::MetadataResolution(_) => Stage::MetadataResolution,
            JobError::StreamOpen(_) => Stage::StreamOpen,
            JobError::StreamStalled { .. } => Stage::StreamStalled,
            JobError::Transcode(_) => Stage::Transcode,
        }
    }

    /// Converts into the terminal failure event for `resource_id`,
    /// carrying the originating collaborator's message.
    pub(crate) fn into_failure(self, resource_id: ResourceId) -> JobFailure {
        let stage = self.stage();
        let reason = match self {
            JobError::MetadataResolution(error) | JobError::StreamOpen(error) => error.to_string(),
            JobError::StreamStalled { reason } => reason,
            JobError::Transcode(error) => error.to_string(),
        };
        JobFailure {
            resource_id,
            stage,
            reason,
        }
    }
}

/// Runs one job to its terminal state.
///
/// Stage failures map straight to [`JobError`]; no retries happen at this
/// layer. All progress events for the job are delivered before this
/// returns, so the caller's terminal event is always last.
pub(crate) async fn execute_job<P, T>(
    job: &Job,
    provider: &P,
    transcoder: &T,
    config: &PipelineConfig,
    events: &broadcast::Sender<PipelineEvent>,
) -> Result<super::events::JobResult, JobError>
where
    P: SourceProvider + ?Sized,
    T: Transcoder + ?Sized,
{
    tracing::debug!("job {}: resolving metadata", job.resource_id);
    let metadata = provider
        .resolve_metadata(&job.resource_id)
        .await
        .map_err(JobError::MetadataResolution)?;

    tracing::debug!(
        "job {}: opening stream for {} (quality {})",
        job.resource_id,
        metadata.source_url,
        config.quality
    );
    let stream = provider
        .open_stream(&metadata, &config.quality)
        .await
        .map_err(JobError::StreamOpen)?;

    let (meter, snapshots) = ProgressMeter::new(
        stream.reader,
        stream.content_length,
        config.progress_interval,
        config.stall_timeout,
    );
    let relay = relay_progress(snapshots, events.clone(), job.resource_id.clone());

    let settings = EncodeSettings::with_audio_bitrate(metadata.preferred_bitrate());
    let encoded = transcoder
        .encode(Box::new(meter), &settings, &job.output_path)
        .await;

    // The transcoder has dropped the meter by now, so the relay drains any
    // remaining snapshots and finishes before the terminal event goes out.
    let stats = relay.await.unwrap_or(None);

    match encoded {
        Ok(()) => Ok(super::events::JobResult {
            resource_id: job.resource_id.clone(),
            source_url: metadata.source_url,
            output_path: job.output_path.clone(),
            stats,
        }),
        Err(TranscodeError::InputStalled { reason }) => Err(JobError::StreamStalled { reason }),
        Err(error) => Err(JobError::Transcode(error)),
    }
}

/// Forwards progress snapshots to subscribers, returning the terminal
/// snapshot for inclusion in the job's result.
fn relay_progress(
    mut snapshots: mpsc::UnboundedReceiver<ProgressSnapshot>,
    events: broadcast::Sender<PipelineEvent>,
    resource_id: ResourceId,
) -> JoinHandle<Option<ProgressSnapshot>> {
    tokio::spawn(async move {
        let mut terminal = None;
        while let Some(snapshot) = snapshots.recv().await {
            if snapshot.is_terminal() {
                terminal = Some(snapshot.clone());
            }
            let event = PipelineEvent::Progress {
                resource_id: resource_id.clone(),
                snapshot,
            };
            if events.send(event).is_err() {
                tracing::debug!("no subscribers for progress events");
            }
        }
        terminal
    })
}
