//! CLI command implementations

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use pmoairplay::{
    ClientConfig, CommandError, DeviceCommandClient, DeviceTarget, MediaHttpServer, MediaKind, Outcome,
    ServerConfig, ServerError, Transition, media,
};
use pmoconfig::Config;
use tracing::{info, warn};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the media server until interrupted
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Push an image to a receiver
    Photo {
        /// Receiver base URL, e.g. http://192.168.1.20:7000
        receiver: String,
        /// Image file to display
        file: PathBuf,
        /// One of None, Random, Dissolve, SlideLeft, SlideRight
        #[arg(short, long)]
        transition: Option<Transition>,
    },
    /// Serve a video and tell the receiver to play it
    Play {
        /// Receiver base URL
        receiver: String,
        /// Video file to stream
        file: PathBuf,
        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host or IP put in the media URL (overrides the configuration)
        #[arg(long)]
        host: Option<String>,
    },
    /// Stop playback on a receiver
    Stop {
        /// Receiver base URL
        receiver: String,
    },
    /// Show an image or play a video, depending on the file
    Beam {
        /// Receiver base URL
        receiver: String,
        /// Media file
        file: PathBuf,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the first failure of the command: configuration, server bind,
/// or the receiver's answer.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Serve { port } => serve(config, port),
        Commands::Photo {
            receiver,
            file,
            transition,
        } => photo(config, &receiver, &file, transition),
        Commands::Play {
            receiver,
            file,
            port,
            host,
        } => play(config, &receiver, &file, port, host),
        Commands::Stop { receiver } => stop(&receiver),
        Commands::Beam { receiver, file } => beam(config, &receiver, &file),
    }
}

fn start_server(config: &Config, port: Option<u16>) -> Result<MediaHttpServer> {
    let port = match port {
        Some(port) => port,
        None => config.get_http_port()?,
    };

    MediaHttpServer::start(ServerConfig::with_port(port)).map_err(|err| {
        let owner = match &err {
            ServerError::Bind(..) => pmoutils::find_process_using_port(port),
            _ => None,
        };
        match owner {
            Some(owner) => anyhow!(err).context(format!("Port {} is already used by {}", port, owner)),
            None => anyhow!(err),
        }
    })
}

/// Absolute path of an existing media file.
fn media_file(file: &Path) -> Result<PathBuf> {
    let path = fs::canonicalize(file)
        .with_context(|| format!("Cannot access {}", file.display()))?;
    if !path.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    Ok(path)
}

fn configured_transition(config: &Config) -> Result<Transition> {
    config
        .get_transition()?
        .parse::<Transition>()
        .map_err(|e| anyhow!(e))
}

/// Submit one command and wait for the receiver's answer.
fn run_command<F>(submit: F) -> Result<()>
where
    F: FnOnce(&DeviceCommandClient) -> Result<(), CommandError>,
{
    let (client, outcomes) = DeviceCommandClient::with_channel(ClientConfig::default())
        .context("Cannot start the command worker")?;
    submit(&client)?;

    let outcome = outcomes
        .recv()
        .context("Command worker exited without an outcome")?;
    client.shutdown();

    match outcome {
        Outcome::Success { command } => {
            println!("{}: done", command.name());
            Ok(())
        }
        Outcome::Failure { command, message } => bail!("{} failed: {}", command.name(), message),
    }
}

fn serve(config: &Config, port: Option<u16>) -> Result<()> {
    let server = start_server(config, port)?;
    println!("Serving media on port {}, press Ctrl+C to stop", server.port());
    server.join();
    Ok(())
}

fn photo(config: &Config, receiver: &str, file: &Path, transition: Option<Transition>) -> Result<()> {
    let path = media_file(file)?;
    let transition = match transition {
        Some(t) => t,
        None => configured_transition(config)?,
    };
    let target = DeviceTarget::new(receiver);
    info!(path = %path.display(), %transition, "Pushing image");

    run_command(|client| client.put_image(path, transition, &target))
}

fn play(
    config: &Config,
    receiver: &str,
    file: &Path,
    port: Option<u16>,
    host: Option<String>,
) -> Result<()> {
    let path = media_file(file)?;
    let server = start_server(config, port)?;
    let host = host.unwrap_or_else(|| config.get_media_host());
    let url = media::media_url(&host, server.port(), &path);
    let target = DeviceTarget::new(receiver);
    info!(url = url.as_str(), "Asking receiver to play");

    run_command(|client| client.play_video(url, &target))?;

    // the receiver keeps fetching ranges while it plays
    println!("Streaming {}, press Ctrl+C to stop", path.display());
    server.join();
    Ok(())
}

fn stop(receiver: &str) -> Result<()> {
    let target = DeviceTarget::new(receiver);
    run_command(|client| client.stop_video(&target))
}

fn beam(config: &Config, receiver: &str, file: &Path) -> Result<()> {
    match MediaKind::from_path(file) {
        MediaKind::Image => photo(config, receiver, file, None),
        MediaKind::Video => play(config, receiver, file, None, None),
        MediaKind::Unknown => {
            warn!(path = %file.display(), "Unknown media type, streaming it as a video");
            play(config, receiver, file, None, None)
        }
    }
}
