//! Scheduler actor owning the job queue.
//!
//! All mutable scheduling state (the pending FIFO and the running count)
//! lives inside one actor task; commands arrive over a channel and events
//! leave over a broadcast sender, so no scheduling state is ever shared or
//! locked. Admitted jobs execute as spawned tasks and report exactly one
//! terminal outcome each back to the actor.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use super::events::{JobFailure, JobResult, PipelineEvent};
use super::handle::PipelineHandle;
use super::job::{Job, execute_job};
use crate::config::PipelineConfig;
use crate::filename::sanitize_file_name;
use crate::source::{ResourceId, SourceProvider};
use crate::transcode::Transcoder;

/// Events buffered per subscriber before a slow one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Commands accepted by the scheduler actor.
#[derive(Debug)]
pub(crate) enum PipelineCommand {
    Submit {
        resource_id: ResourceId,
        file_name: String,
    },
    QueueDepth {
        responder: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Terminal outcome reported by one job task.
type JobOutcome = Result<JobResult, JobFailure>;

/// Spawns the pipeline scheduler and returns its handle.
///
/// The scheduler runs until [`PipelineHandle::shutdown`] is called or every
/// handle is dropped. `provider` and `transcoder` are shared by all job
/// executions.
pub fn spawn_pipeline<P, T>(config: PipelineConfig, provider: P, transcoder: T) -> PipelineHandle
where
    P: SourceProvider + 'static,
    T: Transcoder + 'static,
{
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let scheduler = Scheduler {
        config: Arc::new(config),
        provider: Arc::new(provider),
        transcoder: Arc::new(transcoder),
        events: events.clone(),
        pending: VecDeque::new(),
        running: 0,
    };
    tokio::spawn(scheduler.run(command_rx));

    PipelineHandle::new(commands, events)
}

struct Scheduler<P, T> {
    config: Arc<PipelineConfig>,
    provider: Arc<P>,
    transcoder: Arc<T>,
    events: broadcast::Sender<PipelineEvent>,
    pending: VecDeque<Job>,
    running: usize,
}

impl<P, T> Scheduler<P, T>
where
    P: SourceProvider + 'static,
    T: Transcoder + 'static,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PipelineCommand>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<JobOutcome>();
        tracing::debug!("pipeline scheduler started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PipelineCommand::Submit { resource_id, file_name }) => {
                        self.admit(resource_id, file_name, &done_tx);
                    }
                    Some(PipelineCommand::QueueDepth { responder }) => {
                        let _ = responder.send(self.depth());
                    }
                    Some(PipelineCommand::Shutdown) | None => break,
                },
                // done_tx is held here, so recv never yields None
                Some(outcome) = done_rx.recv() => self.finish(outcome, &done_tx),
            }
        }

        tracing::debug!("pipeline scheduler stopped");
    }

    fn admit(
        &mut self,
        resource_id: ResourceId,
        file_name: String,
        done: &mpsc::UnboundedSender<JobOutcome>,
    ) {
        let file_name = sanitize_file_name(&file_name);
        let output_path = self.config.output_dir.join(&file_name);
        let job = Job {
            resource_id,
            file_name,
            output_path,
        };

        tracing::info!(
            "job {} enqueued as {} -> {}",
            job.resource_id,
            job.file_name,
            job.output_path.display()
        );
        self.pending.push_back(job);
        self.emit_queue_depth();
        self.start_pending(done);
    }

    /// Starts pending jobs in FIFO order while capacity remains.
    fn start_pending(&mut self, done: &mpsc::UnboundedSender<JobOutcome>) {
        let capacity = self.config.max_concurrent_jobs.max(1);

        while self.running < capacity
            && let Some(job) = self.pending.pop_front()
        {
            self.running += 1;
            tracing::debug!("job {} started ({} running)", job.resource_id, self.running);

            let provider = Arc::clone(&self.provider);
            let transcoder = Arc::clone(&self.transcoder);
            let config = Arc::clone(&self.config);
            let events = self.events.clone();
            let done = done.clone();

            tokio::spawn(async move {
                let outcome = execute_job(
                    &job,
                    provider.as_ref(),
                    transcoder.as_ref(),
                    &config,
                    &events,
                )
                .await
                .map_err(|error| error.into_failure(job.resource_id.clone()));
                // The scheduler may already be gone during shutdown
                let _ = done.send(outcome);
            });
        }
    }

    /// Handles one job's terminal outcome: forward the event, free the
    /// slot, start the next pending job.
    fn finish(&mut self, outcome: JobOutcome, done: &mpsc::UnboundedSender<JobOutcome>) {
        self.running -= 1;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    "job {} completed -> {}",
                    result.resource_id,
                    result.output_path.display()
                );
                self.broadcast(PipelineEvent::Completed(result));
            }
            Err(failure) => {
                tracing::warn!(
                    "job {} failed at {}: {}",
                    failure.resource_id,
                    failure.stage,
                    failure.reason
                );
                self.broadcast(PipelineEvent::Failed(failure));
            }
        }

        self.emit_queue_depth();
        self.start_pending(done);
    }

    fn depth(&self) -> usize {
        self.running + self.pending.len()
    }

    fn emit_queue_depth(&self) {
        self.broadcast(PipelineEvent::QueueDepth {
            depth: self.depth(),
        });
    }

    fn broadcast(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no subscribers for pipeline events");
        }
    }
}
