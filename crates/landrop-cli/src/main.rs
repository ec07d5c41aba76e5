//! LANDrop CLI - Encrypted peer-to-peer file transfer on the local network
//!
//! Devices find each other over UDP broadcast and transfer files over an
//! encrypted TCP connection. Both ends show a six-digit security code that
//! can be compared to rule out a man in the middle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Wait for incoming files
//! landrop receive
//!
//! # Send files (on another device)
//! landrop send --to Marcus-Laptop ./document.pdf
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Receive(args) => commands::receive::run(args).await,
        Command::Send(args) => commands::send::run(args).await,
        Command::Scan(args) => commands::scan::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if verbose {
        "info,landrop=debug,landrop_core=debug"
    } else {
        "warn,landrop=info,landrop_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
