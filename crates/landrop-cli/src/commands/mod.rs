//! CLI command definitions and handlers.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Load configuration with graceful fallback to defaults.
///
/// A configuration file that cannot be read or fails validation is reported
/// and replaced by the defaults.
pub fn load_config() -> landrop_core::config::Config {
    landrop_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        landrop_core::config::Config::default()
    })
}

pub mod config;
pub mod receive;
pub mod scan;
pub mod send;

/// LANDrop - Encrypted peer-to-peer file transfer on the local network
#[derive(Parser)]
#[command(name = "landrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Wait for incoming transfers
    Receive(ReceiveArgs),

    /// Send files to a device on the network
    Send(SendArgs),

    /// List devices accepting transfers
    Scan(ScanArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the receive command
#[derive(Parser)]
pub struct ReceiveArgs {
    /// Output directory for received files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TCP port to listen on (default: any free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not answer discovery requests with the listening port
    #[arg(long)]
    pub hidden: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Non-interactive mode (auto-accept)
    #[arg(long)]
    pub batch: bool,
}

/// Arguments for the send command
#[derive(Parser)]
#[command(group(ArgGroup::new("target").required(true).args(["to", "addr"])))]
pub struct SendArgs {
    /// Files to send
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Name of the receiving device, as shown by `landrop scan`
    #[arg(short, long)]
    pub to: Option<String>,

    /// Address of the receiving device (HOST:PORT)
    #[arg(short, long)]
    pub addr: Option<String>,

    /// How long to search for the device (e.g., 5s, 1m)
    #[arg(long, default_value = "10s")]
    pub timeout: String,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the scan command
#[derive(Parser)]
pub struct ScanArgs {
    /// Duration to scan (e.g., 5s, 10s)
    #[arg(short, long, default_value = "5s")]
    pub duration: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., network.discoverable)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_requires_target() {
        assert!(Cli::try_parse_from(["landrop", "send", "a.txt"]).is_err());
        assert!(Cli::try_parse_from(["landrop", "send", "a.txt", "--to", "desk", "--addr", "1.2.3.4:5"]).is_err());

        let cli = Cli::try_parse_from(["landrop", "send", "a.txt", "b.txt", "--to", "desk"]).unwrap();
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.to.as_deref(), Some("desk"));
    }

    #[test]
    fn test_global_verbose() {
        let cli = Cli::try_parse_from(["landrop", "scan", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
