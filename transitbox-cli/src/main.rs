//! TransitBox CLI
//!
//! Headless front-end for the TransitBox library: polls a vehicle position
//! feed and prints what a map renderer would receive.

mod commands;
mod console;
mod error;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::decode::DecodeArgs;
use commands::watch::WatchArgs;

#[derive(Parser)]
#[command(name = "transitbox")]
#[command(about = "Live transit vehicle positions from GTFS-Realtime feeds", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a feed and stream vehicle and camera updates until Ctrl+C
    Watch(WatchArgs),

    /// List the built-in feed sources
    Sources,

    /// Decode a GTFS-Realtime payload from a file
    Decode(DecodeArgs),

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Sources => commands::sources::run(),
        Commands::Decode(args) => commands::decode::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
