//! Command-line interface for strictly_duel.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Duel - two-player tic-tac-toe over TCP
#[derive(Parser, Debug)]
#[command(name = "strictly_duel")]
#[command(about = "Pairs players two at a time into tic-tac-toe sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// TOML config file (host, port)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Join a game from the terminal
    Play {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long, default_value_t = strictly_duel::DEFAULT_PORT)]
        port: u16,
    },
}
