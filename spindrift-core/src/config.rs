//! Centralized configuration for the Spindrift pipeline.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

use crate::source::QualityProfile;

/// Configuration for a pipeline instance.
///
/// Constructed once and shared read-only by all jobs. Supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stream variant selection policy, shared by all jobs
    pub quality: QualityProfile,
    /// Directory that transcoded files are written to
    pub output_dir: PathBuf,
    /// Maximum number of jobs executing at once (minimum 1)
    pub max_concurrent_jobs: usize,
    /// Interval between progress snapshots for a job's transfer
    pub progress_interval: Duration,
    /// Inactivity window after which a silent stream fails the job
    /// (None = stalled streams are never failed)
    pub stall_timeout: Option<Duration>,
    /// Path to the ffmpeg binary (None = resolve from PATH)
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: QualityProfile::Highest,
            output_dir: std::env::temp_dir(),
            max_concurrent_jobs: 1,
            progress_interval: Duration::from_millis(1000),
            stall_timeout: Some(Duration::from_secs(120)),
            ffmpeg_path: None,
        }
    }
}

impl PipelineConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SPINDRIFT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Ok(quality) = std::env::var("SPINDRIFT_QUALITY") {
            config.quality = quality.parse().unwrap_or_default();
        }

        if let Ok(jobs) = std::env::var("SPINDRIFT_MAX_JOBS") {
            if let Ok(count) = jobs.parse::<usize>() {
                config.max_concurrent_jobs = count.max(1);
            }
        }

        if let Ok(interval) = std::env::var("SPINDRIFT_PROGRESS_INTERVAL_MS") {
            if let Ok(millis) = interval.parse::<u64>() {
                config.progress_interval = Duration::from_millis(millis.max(1));
            }
        }

        // 0 disables stall detection entirely
        if let Ok(stall) = std::env::var("SPINDRIFT_STALL_TIMEOUT_SECS") {
            if let Ok(seconds) = stall.parse::<u64>() {
                config.stall_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
            }
        }

        if let Ok(path) = std::env::var("SPINDRIFT_FFMPEG_PATH") {
            config.ffmpeg_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Uses a short progress interval so snapshot-driven assertions run
    /// quickly, and disables stall detection.
    pub fn for_testing() -> Self {
        Self {
            progress_interval: Duration::from_millis(10),
            stall_timeout: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = PipelineConfig::default();

        assert_eq!(config.quality, QualityProfile::Highest);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.progress_interval, Duration::from_millis(1000));
        assert_eq!(config.stall_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.ffmpeg_path, None);
    }

    #[test]
    fn test_testing_preset() {
        let config = PipelineConfig::for_testing();

        assert_eq!(config.progress_interval, Duration::from_millis(10));
        assert_eq!(config.stall_timeout, None);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SPINDRIFT_OUTPUT_DIR", "/var/spindrift");
            std::env::set_var("SPINDRIFT_QUALITY", "lowest");
            std::env::set_var("SPINDRIFT_MAX_JOBS", "4");
            std::env::set_var("SPINDRIFT_PROGRESS_INTERVAL_MS", "250");
            std::env::set_var("SPINDRIFT_STALL_TIMEOUT_SECS", "0");
        }

        let config = PipelineConfig::from_env();

        assert_eq!(config.output_dir, PathBuf::from("/var/spindrift"));
        assert_eq!(config.quality, QualityProfile::Lowest);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.progress_interval, Duration::from_millis(250));
        assert_eq!(config.stall_timeout, None);

        // A zero parallelism override is clamped up to one
        unsafe {
            std::env::set_var("SPINDRIFT_MAX_JOBS", "0");
        }
        assert_eq!(PipelineConfig::from_env().max_concurrent_jobs, 1);

        // Cleanup
        unsafe {
            std::env::remove_var("SPINDRIFT_OUTPUT_DIR");
            std::env::remove_var("SPINDRIFT_QUALITY");
            std::env::remove_var("SPINDRIFT_MAX_JOBS");
            std::env::remove_var("SPINDRIFT_PROGRESS_INTERVAL_MS");
            std::env::remove_var("SPINDRIFT_STALL_TIMEOUT_SECS");
        }
    }
}
