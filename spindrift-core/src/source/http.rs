//! HTTP-backed source provider.
//!
//! Resolves resource ids against a configured base URL with plain HTTP:
//! a HEAD request supplies the header-derived metadata, a GET supplies the
//! byte stream. No vendor protocol is implemented; any backend that serves
//! media over HTTP works.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use tokio_util::io::StreamReader;
use url::Url;

use super::{
    AudioFormat, MediaStream, QualityProfile, ResourceId, SourceError, SourceMetadata,
    SourceProvider,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "spindrift/0.1.0";

/// Source provider fetching streams from an HTTP backend.
pub struct HttpSourceProvider {
    client: Client,
    base_url: Url,
}

impl HttpSourceProvider {
    /// Creates a provider resolving resource ids against `base_url`.
    ///
    /// # Errors
    /// - `SourceError::Network` - The HTTP client could not be constructed
    pub fn new(base_url: Url) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| SourceError::Network {
                reason: error.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    fn resource_url(&self, id: &ResourceId) -> Result<Url, SourceError> {
        self.base_url
            .join(id.as_str())
            .map_err(|error| SourceError::InvalidResponse {
                reason: format!("cannot build resource URL for {id}: {error}"),
            })
    }

    fn check_status(
        status: StatusCode,
        resource_id: &ResourceId,
        url: &Url,
    ) -> Result<(), SourceError> {
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                resource_id: resource_id.clone(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Network {
                reason: format!("{url} answered {status}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceProvider for HttpSourceProvider {
    async fn resolve_metadata(&self, id: &ResourceId) -> Result<SourceMetadata, SourceError> {
        let url = self.resource_url(id)?;
        tracing::debug!("resolving metadata for {id} via {url}");

        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|error| SourceError::Network {
                reason: error.to_string(),
            })?;
        Self::check_status(response.status(), id, &url)?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Plain HTTP serves a single variant; the bitrate is unknown until
        // the encoder probes the stream, so it is left for the default.
        Ok(SourceMetadata {
            resource_id: id.clone(),
            title: id.to_string(),
            source_url: url.to_string(),
            formats: vec![AudioFormat {
                format_id: "source".to_string(),
                audio_bitrate: None,
                mime_type,
            }],
        })
    }

    async fn open_stream(
        &self,
        metadata: &SourceMetadata,
        quality: &QualityProfile,
    ) -> Result<MediaStream, SourceError> {
        let url = self.resource_url(&metadata.resource_id)?;
        tracing::debug!(
            "opening stream for {} (quality {quality})",
            metadata.resource_id
        );

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| SourceError::Network {
                reason: error.to_string(),
            })?;
        Self::check_status(response.status(), &metadata.resource_id, &url)?;

        let content_length = response.content_length();
        let body = Box::pin(response.bytes_stream().map_err(io::Error::other));
        let reader = StreamReader::new(body);

        Ok(MediaStream {
            content_length,
            reader: Box::new(reader),
        })
    }
}
