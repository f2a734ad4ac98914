//! CLI command implementations

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Subcommand;
use spindrift_core::{
    FfmpegTranscoder, HttpSourceProvider, PipelineConfig, PipelineEvent, QualityProfile,
    Transcoder, spawn_pipeline,
};
use spindrift_sim::{SimulatedResource, SimulatedSource, SimulatedTranscoder};
use tokio::sync::broadcast;
use url::Url;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one or more resources and transcode their audio to mp3
    Fetch {
        /// Resource identifiers to fetch
        ids: Vec<String>,
        /// Base URL each resource id is resolved against
        #[arg(long)]
        base_url: String,
        /// Output directory for transcoded files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Quality profile (highest, lowest, or an explicit format id)
        #[arg(long, default_value = "highest")]
        quality: QualityProfile,
        /// Maximum number of jobs running at once
        #[arg(short, long, default_value = "1")]
        jobs: usize,
        /// Path to the ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
        /// Emit events as JSON lines instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Check that the ffmpeg encoder is available
    Check {
        /// Path to the ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
    },
    /// Run a scripted demo pipeline without network access or ffmpeg
    Demo {
        /// Output directory for the demo files
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Fetch {
            ids,
            base_url,
            output,
            quality,
            jobs,
            ffmpeg,
            json,
        } => fetch(ids, base_url, output, quality, jobs, ffmpeg, json).await,
        Commands::Check { ffmpeg } => check(ffmpeg),
        Commands::Demo { output } => run_demo(output).await,
    }
}

async fn fetch(
    ids: Vec<String>,
    base_url: String,
    output: Option<PathBuf>,
    quality: QualityProfile,
    jobs: usize,
    ffmpeg: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    if ids.is_empty() {
        bail!("no resource ids given");
    }
    let base_url = Url::parse(&base_url).context("invalid base URL")?;

    let mut config = PipelineConfig::from_env();
    config.quality = quality;
    config.max_concurrent_jobs = jobs.max(1);
    if let Some(dir) = output {
        config.output_dir = dir;
    }
    if let Some(path) = ffmpeg {
        config.ffmpeg_path = Some(path);
    }
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("cannot create {}", config.output_dir.display()))?;

    let transcoder = FfmpegTranscoder::new(config.ffmpeg_path.clone());
    if !transcoder.is_available() {
        bail!("ffmpeg is not available; install it or pass --ffmpeg");
    }
    let provider = HttpSourceProvider::new(base_url)?;

    let expected = ids.len();
    let handle = spawn_pipeline(config, provider, transcoder);
    let mut events = handle.subscribe();
    for id in &ids {
        handle.submit(id.as_str(), format!("{id}.mp3"))?;
    }

    let failures = consume_events(&mut events, expected, json).await?;
    handle.shutdown();

    if failures > 0 {
        bail!("{failures} of {expected} jobs failed");
    }
    Ok(())
}

fn check(ffmpeg: Option<PathBuf>) -> anyhow::Result<()> {
    let transcoder = FfmpegTranscoder::new(ffmpeg);
    if !transcoder.is_available() {
        bail!("ffmpeg is not available");
    }
    println!("ffmpeg is available");
    Ok(())
}

async fn run_demo(output: Option<PathBuf>) -> anyhow::Result<()> {
    let source = SimulatedSource::new();
    source.add_resource(
        "demo-1",
        SimulatedResource::new("Demo Track", 512 * 1024)
            .with_chunk_size(16 * 1024)
            .with_chunk_delay(Duration::from_millis(2)),
    );
    source.add_resource(
        "demo-2",
        SimulatedResource::new("Broken Track", 1024).failing_resolution("scripted failure"),
    );

    let config = PipelineConfig {
        output_dir: output.unwrap_or_else(std::env::temp_dir),
        progress_interval: Duration::from_millis(100),
        ..PipelineConfig::default()
    };
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("cannot create {}", config.output_dir.display()))?;

    let handle = spawn_pipeline(config, source, SimulatedTranscoder::new());
    let mut events = handle.subscribe();
    handle.submit("demo-1", "Demo: Track?.mp3")?;
    handle.submit("demo-2", "Broken Track.mp3")?;

    // The second demo job fails by script; that is the point of the demo
    consume_events(&mut events, 2, false).await?;
    handle.shutdown();
    Ok(())
}

/// Renders events until `expected` terminal events arrived, returning the
/// number of failed jobs.
async fn consume_events(
    events: &mut broadcast::Receiver<PipelineEvent>,
    expected: usize,
    json: bool,
) -> anyhow::Result<usize> {
    let mut remaining = expected;
    let mut failures = 0usize;

    while remaining > 0 {
        match events.recv().await {
            Ok(event) => {
                match &event {
                    PipelineEvent::Completed(_) => remaining -= 1,
                    PipelineEvent::Failed(_) => {
                        remaining -= 1;
                        failures += 1;
                    }
                    _ => {}
                }
                render_event(&event, json)?;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("event feed lagged, {skipped} events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                bail!("pipeline event feed closed unexpectedly");
            }
        }
    }

    Ok(failures)
}

fn render_event(event: &PipelineEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        PipelineEvent::QueueDepth { depth } => {
            println!("queue depth: {depth}");
        }
        PipelineEvent::Progress {
            resource_id,
            snapshot,
        } => match snapshot.percentage {
            Some(percentage) => println!(
                "{resource_id}: {percentage:5.1}%  {} bytes  {:.0} B/s",
                snapshot.transferred_bytes, snapshot.bytes_per_second
            ),
            None => println!(
                "{resource_id}: {} bytes  {:.0} B/s",
                snapshot.transferred_bytes, snapshot.bytes_per_second
            ),
        },
        PipelineEvent::Completed(result) => {
            println!(
                "{}: done -> {}",
                result.resource_id,
                result.output_path.display()
            );
        }
        PipelineEvent::Failed(failure) => {
            eprintln!(
                "{}: failed at {}: {}",
                failure.resource_id, failure.stage, failure.reason
            );
        }
    }
    Ok(())
}
