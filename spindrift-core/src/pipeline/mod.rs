//! Concurrent job pipeline.
//!
//! The pipeline admits fetch-and-transcode jobs into a bounded-parallelism
//! scheduler, drives each one through the source provider, progress meter
//! and transcoder in sequence, and broadcasts lifecycle events (queue
//! depth, progress, completion, failure) to subscribers. For every
//! admitted job exactly one terminal event is emitted, success and failure
//! alike; a failing job never blocks the pool.
//!
//! The scheduler is an actor owning all mutable queue state; callers
//! interact with it exclusively through the cloneable [`PipelineHandle`].

mod events;
mod handle;
mod job;
mod scheduler;

pub use events::{JobFailure, JobResult, PipelineEvent, Stage};
pub use handle::{PipelineError, PipelineHandle};
pub use job::Job;
pub use scheduler::spawn_pipeline;
