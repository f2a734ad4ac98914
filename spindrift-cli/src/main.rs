//! Spindrift CLI - Command-line interface
//!
//! Provides command-line access to the Spindrift pipeline.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "spindrift")]
#[command(about = "Fetch remote media and transcode the audio to mp3")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    commands::handle_command(cli.command).await?;

    Ok(())
}
