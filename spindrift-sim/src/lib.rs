//! Spindrift Simulation - deterministic collaborators for pipeline testing.
//!
//! Provides in-memory source providers and transcoders with scripted
//! content, adjustable pacing and failure injection, so pipeline behavior
//! (admission order, concurrency caps, progress cadence, stall detection)
//! can be exercised without network access or an ffmpeg installation.

pub mod source;
pub mod transcode;

pub use source::{SimulatedResource, SimulatedSource};
pub use transcode::SimulatedTranscoder;
