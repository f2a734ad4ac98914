//! In-memory transcoder with fault injection.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use spindrift_core::transcode::{EncodeSettings, TranscodeError, Transcoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Transcoder that drains its input into the destination file unchanged.
///
/// Tracks the high-water mark of concurrent encodes so concurrency-cap
/// assertions can be made, and optionally injects an encoder fault after a
/// configurable number of input bytes. Clones share their counters.
#[derive(Clone, Default)]
pub struct SimulatedTranscoder {
    fail_after_bytes: Option<u64>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl SimulatedTranscoder {
    /// Creates a transcoder that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects an encoder fault once `bytes` of input were consumed.
    pub fn failing_after(mut self, bytes: u64) -> Self {
        self.fail_after_bytes = Some(bytes);
        self
    }

    /// Highest number of encodes that ever ran at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Number of encodes that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Decrements the active-encode count when an encode ends, however it ends.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transcoder for SimulatedTranscoder {
    async fn encode(
        &self,
        mut input: Box<dyn AsyncRead + Send + Unpin>,
        _settings: &EncodeSettings,
        destination: &Path,
    ) -> Result<(), TranscodeError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard {
            active: Arc::clone(&self.active),
        };

        let mut output = tokio::fs::File::create(destination).await?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut consumed = 0u64;

        loop {
            let read = match input.read(&mut buffer).await {
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::TimedOut => {
                    return Err(TranscodeError::InputStalled {
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(TranscodeError::Io(error)),
            };
            if read == 0 {
                break;
            }

            consumed += read as u64;
            if let Some(limit) = self.fail_after_bytes
                && consumed >= limit
            {
                return Err(TranscodeError::EncoderFailed {
                    reason: format!("simulated encoder fault after {consumed} bytes"),
                });
            }

            output.write_all(&buffer[..read]).await?;
        }

        output.flush().await?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
