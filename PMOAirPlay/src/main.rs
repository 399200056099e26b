//! PMOAirPlay command line
//!
//! Serves local media files and drives an AirPlay-style receiver.

mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pmoairplay")]
#[command(about = "Stream local photos and videos to an AirPlay receiver")]
struct Cli {
    /// Configuration directory (defaults to $PMOAIRPLAY_CONFIG, ./.pmoairplay, ~/.pmoairplay)
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = pmoconfig::Config::load_config(&cli.config)?;
    commands::handle_command(cli.command, &config)
}
