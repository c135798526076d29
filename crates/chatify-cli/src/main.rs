//! Chatify CLI - a terminal client for the Chatify conversation
//!
//! Sends messages while online, reads the cached conversation while
//! offline, and queues failed sends until the remote log accepts them.

mod cli;
mod commands;
mod device;
mod error;


use chatify_core::models::Coordinates;
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{normalize_message_text, resolve_data_dir};
use crate::commands::compose::{run_compose, ComposeAction};
use crate::commands::list::run_list;
use crate::commands::outbox::run_outbox;
use crate::commands::watch::run_watch;
use crate::device::CliDevice;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "chatify=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    match cli.command {
        Commands::Send { text } => {
            let text = normalize_message_text(&text)?;
            run_compose(ComposeAction::Text(text), CliDevice::default(), &data_dir).await?;
        }
        Commands::Image { path, camera } => {
            let action = if camera {
                ComposeAction::CameraPhoto
            } else {
                ComposeAction::LibraryImage
            };
            run_compose(action, CliDevice::with_image(path, camera), &data_dir).await?;
        }
        Commands::Location { lat, lon } => {
            let position = Coordinates::new(lat, lon)?;
            let device = CliDevice::with_position(position);
            run_compose(ComposeAction::Location, device, &data_dir).await?;
        }
        Commands::Audio { path } => {
            let device = CliDevice::with_recording(path);
            run_compose(ComposeAction::Audio, device, &data_dir).await?;
        }
        Commands::List { limit, json } => run_list(limit, json, &data_dir).await?,
        Commands::Watch { limit } => run_watch(limit, &data_dir).await?,
        Commands::Outbox { json } => run_outbox(json, &data_dir).await?,
    }

    Ok(())
}
