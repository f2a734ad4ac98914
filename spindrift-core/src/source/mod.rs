//! Source acquisition boundary.
//!
//! Resolving a resource id into metadata and opening the actual byte
//! stream are delegated to a [`SourceProvider`]. The pipeline never speaks
//! any vendor protocol itself; it only consumes the two-phase contract
//! defined here: resolve metadata first, then open a stream for the
//! configured quality profile. The stream's header-derived length arrives
//! with [`MediaStream`] before any data is read.

pub mod http;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

pub use http::HttpSourceProvider;

/// Caller-supplied identifier of one remote resource.
///
/// Opaque to the pipeline; providers decide how an id maps onto their
/// backend. Jobs, events and errors are all tagged with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a ResourceId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Policy selecting which available stream variant a provider should open.
///
/// Configured once at pipeline construction and shared read-only by all
/// jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityProfile {
    /// Best available variant
    #[default]
    Highest,
    /// Smallest available variant
    Lowest,
    /// An explicit provider-specific format id
    Format(String),
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityProfile::Highest => write!(f, "highest"),
            QualityProfile::Lowest => write!(f, "lowest"),
            QualityProfile::Format(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for QualityProfile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "highest" => QualityProfile::Highest,
            "lowest" => QualityProfile::Lowest,
            _ => QualityProfile::Format(s.to_string()),
        })
    }
}

/// One audio variant reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Provider-specific format identifier
    pub format_id: String,
    /// Audio bitrate in kbit/s, when the provider reports one
    pub audio_bitrate: Option<u32>,
    /// MIME type of the variant, when known
    pub mime_type: Option<String>,
}

/// Resolved metadata for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// The id this metadata was resolved for
    pub resource_id: ResourceId,
    /// Human-readable title of the resource
    pub title: String,
    /// Canonical URL of the resource at the provider
    pub source_url: String,
    /// Audio variants the provider can serve, best first
    pub formats: Vec<AudioFormat>,
}

impl SourceMetadata {
    /// Audio bitrate of the first reported format, inherited by the encode
    /// parameters.
    pub fn preferred_bitrate(&self) -> Option<u32> {
        self.formats.first().and_then(|format| format.audio_bitrate)
    }
}

/// An open byte stream for one resource.
///
/// The header-derived content length is available before data is read;
/// providers that cannot determine it up front report `None` and the
/// progress percentage stays indeterminate until completion.
pub struct MediaStream {
    /// Total stream length in bytes, when the provider knows it
    pub content_length: Option<u64>,
    /// The stream itself; bytes arrive in order, exactly once
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Two-phase access to a remote media source.
///
/// Implementations surface their own backend's failures through
/// [`SourceError`]; the pipeline treats every error as terminal for the
/// requesting job.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Resolves metadata for a resource id.
    ///
    /// # Errors
    /// - `SourceError::NotFound` - The provider has no such resource
    /// - `SourceError::Network` - The provider could not be reached
    /// - `SourceError::InvalidResponse` - The provider answered garbage
    async fn resolve_metadata(&self, id: &ResourceId) -> Result<SourceMetadata, SourceError>;

    /// Opens the byte stream for previously resolved metadata.
    ///
    /// # Errors
    /// - `SourceError::Network` - The transfer could not be started
    /// - `SourceError::NoUsableFormat` - No variant matches the profile
    async fn open_stream(
        &self,
        metadata: &SourceMetadata,
        quality: &QualityProfile,
    ) -> Result<MediaStream, SourceError>;
}

/// Errors that can occur while acquiring a source stream.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("resource {resource_id} not found")]
    NotFound { resource_id: ResourceId },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("invalid provider response: {reason}")]
    InvalidResponse { reason: String },

    #[error("no usable audio format for quality profile {quality}")]
    NoUsableFormat { quality: QualityProfile },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_profile_round_trip() {
        assert_eq!(
            "highest".parse::<QualityProfile>().unwrap(),
            QualityProfile::Highest
        );
        assert_eq!(
            "LOWEST".parse::<QualityProfile>().unwrap(),
            QualityProfile::Lowest
        );
        assert_eq!(
            "opus-160".parse::<QualityProfile>().unwrap(),
            QualityProfile::Format("opus-160".to_string())
        );
        assert_eq!(QualityProfile::Highest.to_string(), "highest");
    }

    #[test]
    fn test_preferred_bitrate_uses_first_format() {
        let metadata = SourceMetadata {
            resource_id: ResourceId::new("abc"),
            title: "abc".to_string(),
            source_url: "https://example.com/abc".to_string(),
            formats: vec![
                AudioFormat {
                    format_id: "a".to_string(),
                    audio_bitrate: Some(160),
                    mime_type: None,
                },
                AudioFormat {
                    format_id: "b".to_string(),
                    audio_bitrate: Some(64),
                    mime_type: None,
                },
            ],
        };
        assert_eq!(metadata.preferred_bitrate(), Some(160));

        let empty = SourceMetadata {
            formats: Vec::new(),
            ..metadata
        };
        assert_eq!(empty.preferred_bitrate(), None);
    }

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId::from("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }
}
