//! Send command implementation.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use landrop_core::config::Config;
use landrop_core::file::format_size;
use landrop_core::transfer::{send_files, Outcome};

use super::SendArgs;
use crate::ui::{self, parse_duration, SessionView};

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let config = super::load_config();

    let timeout = parse_duration(&args.timeout)
        .context("Invalid timeout format. Use formats like '5s', '10s', '1m'")?;

    if !args.quiet {
        ui::print_header();
    }

    let addr = match (&args.addr, &args.to) {
        (Some(addr), _) => resolve_address(addr).await?,
        (None, Some(name)) => {
            if !args.quiet {
                println!("  Searching for {}...", name);
            }
            find_device(&config, name, timeout).await?
        }
        (None, None) => bail!("Specify a device with --to or an address with --addr"),
    };

    if !args.quiet {
        let total: u64 = args
            .paths
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        println!(
            "  Sending {} file(s) ({}) to {}",
            args.paths.len(),
            format_size(total),
            addr
        );
        println!();
    }

    let mut handle = send_files(addr, &args.paths, &config.session_config())
        .await
        .with_context(|| format!("Failed to start transfer to {}", addr))?;

    let mut view = SessionView::new(args.quiet);
    while let Some(event) = handle.next_event().await {
        view.show(&event);
    }

    match handle.join().await? {
        Outcome::Completed => Ok(()),
        outcome => bail!("Transfer {}", outcome),
    }
}

/// Resolve `HOST:PORT` to a socket address.
async fn resolve_address(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("Invalid address '{}'", addr))?
        .next()
        .with_context(|| format!("No address found for '{}'", addr))
}

/// Find a device accepting transfers by its announced name.
async fn find_device(config: &Config, name: &str, timeout: Duration) -> Result<SocketAddr> {
    let peers = super::scan::search(config, timeout, |peers| {
        peers.find_by_name(name).is_some()
    })
    .await?;

    peers
        .find_by_name(name)
        .map(|peer| peer.endpoint.socket_addr())
        .with_context(|| {
            format!(
                "Device '{}' not found within {}s. Run 'landrop scan' to list devices.",
                name,
                timeout.as_secs()
            )
        })
}
