use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatify")]
#[command(about = "Chat from the terminal, online or off")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local database and stored attachments
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a text message
    Send {
        /// Message text
        text: Vec<String>,
    },
    /// Send an image from disk
    Image {
        /// Image file
        path: PathBuf,
        /// Treat the file as a fresh camera capture
        #[arg(long)]
        camera: bool,
    },
    /// Share a position
    Location {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Send a WAV file as a voice message
    Audio {
        /// WAV file used as the microphone capture
        path: PathBuf,
    },
    /// Show the conversation
    List {
        /// Number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the conversation until interrupted
    Watch {
        /// Number of messages to show on every refresh
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show messages waiting to be delivered
    Outbox {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
