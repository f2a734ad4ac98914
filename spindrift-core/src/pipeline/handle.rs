//! Handle for communicating with the pipeline scheduler.

use tokio::sync::{broadcast, mpsc, oneshot};

use super::events::PipelineEvent;
use super::scheduler::PipelineCommand;
use crate::source::ResourceId;

/// Errors surfaced by the pipeline façade itself.
///
/// Job-level failures are not errors here; they arrive as
/// [`PipelineEvent::Failed`] notifications.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline has shut down")]
    Shutdown,
}

/// Handle for submitting jobs and observing the pipeline.
///
/// Cheap to clone and safe to share across tasks. Results are never
/// returned from [`submit`](Self::submit); every job's lifecycle is
/// reported through the event feed obtained via
/// [`subscribe`](Self::subscribe).
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    commands: mpsc::UnboundedSender<PipelineCommand>,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<PipelineCommand>,
        events: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Enqueues a fetch-and-transcode job; never blocks.
    ///
    /// The output file is written to the configured output directory under
    /// the sanitized `file_name`. Exactly one terminal event will follow
    /// on the event feed.
    ///
    /// # Errors
    /// - `PipelineError::Shutdown` - The scheduler is no longer running
    pub fn submit(
        &self,
        resource_id: impl Into<ResourceId>,
        file_name: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.commands
            .send(PipelineCommand::Submit {
                resource_id: resource_id.into(),
                file_name: file_name.into(),
            })
            .map_err(|_| PipelineError::Shutdown)
    }

    /// Subscribes to the pipeline's event feed.
    ///
    /// Each receiver observes every event emitted after subscribing; slow
    /// receivers may observe `RecvError::Lagged` and continue from the
    /// most recent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Returns the current queue depth (running plus pending jobs).
    ///
    /// # Errors
    /// - `PipelineError::Shutdown` - The scheduler is no longer running
    pub async fn queue_depth(&self) -> Result<usize, PipelineError> {
        let (responder, receiver) = oneshot::channel();
        self.commands
            .send(PipelineCommand::QueueDepth { responder })
            .map_err(|_| PipelineError::Shutdown)?;
        receiver.await.map_err(|_| PipelineError::Shutdown)
    }

    /// Stops admission and shuts the scheduler down.
    ///
    /// Jobs already executing run to completion in the background, but
    /// their terminal events are no longer forwarded.
    pub fn shutdown(&self) {
        let _ = self.commands.send(PipelineCommand::Shutdown);
    }
}
