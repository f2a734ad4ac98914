//! Scripted in-memory source provider.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use spindrift_core::source::{
    AudioFormat, MediaStream, QualityProfile, ResourceId, SourceError, SourceMetadata,
    SourceProvider,
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

/// Behavior script for one simulated resource.
#[derive(Debug, Clone)]
pub struct SimulatedResource {
    title: String,
    payload_len: u64,
    audio_bitrate: Option<u32>,
    chunk_size: usize,
    chunk_delay: Duration,
    advertise_length: bool,
    resolve_error: Option<String>,
    stream_error: bool,
    stall_after: Option<u64>,
}

impl SimulatedResource {
    /// A resource serving `payload_len` bytes under the given title.
    pub fn new(title: impl Into<String>, payload_len: u64) -> Self {
        Self {
            title: title.into(),
            payload_len,
            audio_bitrate: Some(128),
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
            advertise_length: true,
            resolve_error: None,
            stream_error: false,
            stall_after: None,
        }
    }

    /// Overrides the bitrate the first reported format advertises.
    pub fn with_audio_bitrate(mut self, bitrate: Option<u32>) -> Self {
        self.audio_bitrate = bitrate;
        self
    }

    /// Serves the payload in chunks of `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sleeps `delay` between chunks, pacing the transfer.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Omits the content length so the stream's total size is unknown.
    pub fn with_unknown_length(mut self) -> Self {
        self.advertise_length = false;
        self
    }

    /// Metadata resolution fails with the given reason.
    pub fn failing_resolution(mut self, reason: impl Into<String>) -> Self {
        self.resolve_error = Some(reason.into());
        self
    }

    /// Stream open fails claiming no usable format.
    pub fn failing_stream_open(mut self) -> Self {
        self.stream_error = true;
        self
    }

    /// The stream goes permanently silent after serving half its payload.
    pub fn stalling(mut self) -> Self {
        self.stall_after = Some(self.payload_len / 2);
        self
    }
}

/// In-memory source provider serving scripted resources.
///
/// Clones share the same script and recorders, so tests can keep one clone
/// while handing another to the pipeline.
#[derive(Clone, Default)]
pub struct SimulatedSource {
    resources: Arc<Mutex<HashMap<ResourceId, SimulatedResource>>>,
    resolve_order: Arc<Mutex<Vec<ResourceId>>>,
}

impl SimulatedSource {
    /// Creates a provider with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scripted resource under `id`.
    pub fn add_resource(&self, id: impl Into<ResourceId>, resource: SimulatedResource) {
        self.resources.lock().insert(id.into(), resource);
    }

    /// Resource ids in the order their metadata was resolved.
    pub fn resolve_order(&self) -> Vec<ResourceId> {
        self.resolve_order.lock().clone()
    }

    fn resource(&self, id: &ResourceId) -> Result<SimulatedResource, SourceError> {
        self.resources
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                resource_id: id.clone(),
            })
    }
}

#[async_trait]
impl SourceProvider for SimulatedSource {
    async fn resolve_metadata(&self, id: &ResourceId) -> Result<SourceMetadata, SourceError> {
        self.resolve_order.lock().push(id.clone());
        let resource = self.resource(id)?;

        if let Some(reason) = resource.resolve_error {
            return Err(SourceError::InvalidResponse { reason });
        }

        Ok(SourceMetadata {
            resource_id: id.clone(),
            title: resource.title,
            source_url: format!("sim://{id}"),
            formats: vec![AudioFormat {
                format_id: "sim-audio".to_string(),
                audio_bitrate: resource.audio_bitrate,
                mime_type: Some("audio/webm".to_string()),
            }],
        })
    }

    async fn open_stream(
        &self,
        metadata: &SourceMetadata,
        quality: &QualityProfile,
    ) -> Result<MediaStream, SourceError> {
        let resource = self.resource(&metadata.resource_id)?;

        if resource.stream_error {
            return Err(SourceError::NoUsableFormat {
                quality: quality.clone(),
            });
        }

        tracing::debug!(
            "serving {} bytes for {} (quality {quality})",
            resource.payload_len,
            metadata.resource_id
        );
        let content_length = resource.advertise_length.then_some(resource.payload_len);
        let reader = ScriptedReader::new(
            resource.payload_len,
            resource.chunk_size,
            resource.chunk_delay,
            resource.stall_after,
        );

        Ok(MediaStream {
            content_length,
            reader: Box::new(reader),
        })
    }
}

/// Reader producing a deterministic payload in paced chunks.
struct ScriptedReader {
    remaining: u64,
    chunk: Bytes,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    stall_after: Option<u64>,
    produced: u64,
}

impl ScriptedReader {
    fn new(payload_len: u64, chunk_size: usize, delay: Duration, stall_after: Option<u64>) -> Self {
        Self {
            remaining: payload_len,
            chunk: Bytes::from(vec![0xA5; chunk_size]),
            delay,
            sleep: None,
            stall_after,
            produced: 0,
        }
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let Some(sleep) = this.sleep.as_mut() {
            match sleep.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(()) => this.sleep = None,
            }
        }

        // A stalled stream stays pending forever; the consumer's own
        // inactivity deadline is what ends the transfer.
        if let Some(limit) = this.stall_after
            && this.produced >= limit
        {
            return Poll::Pending;
        }

        if this.remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        let len = this
            .chunk
            .len()
            .min(this.remaining as usize)
            .min(buf.remaining());
        buf.put_slice(&this.chunk[..len]);
        this.remaining -= len as u64;
        this.produced += len as u64;

        if !this.delay.is_zero() && this.remaining > 0 {
            this.sleep = Some(Box::pin(tokio::time::sleep(this.delay)));
        }

        Poll::Ready(Ok(()))
    }
}
