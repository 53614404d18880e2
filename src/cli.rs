use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audioshelf")]
#[command(author, version, about = "Self-hosted audiobook library server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the audio files in the library
    List,

    /// Show saved playback positions
    Positions,

    /// Check that external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
