//! Scan command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use landrop_core::config::Config;
use landrop_core::discovery::{DiscoveryService, PeerTable};

use super::ScanArgs;
use crate::ui::{parse_duration, truncate_string};

/// Interval between discovery requests while searching.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Run the scan command.
pub async fn run(args: ScanArgs) -> Result<()> {
    let config = super::load_config();

    let duration = parse_duration(&args.duration)
        .context("Invalid duration format. Use formats like '5s', '10s', '30s'")?;

    if !args.json {
        println!();
        println!("Scanning for devices ({})...", args.duration);
        println!();
    }

    let peers = search(&config, duration, |_| false).await?;

    if args.json {
        output_json_peers(&peers)?;
    } else {
        display_peers(&peers);
    }

    Ok(())
}

/// Solicit announcements until `done` returns true or `duration` elapses.
///
/// This device announces itself as not accepting transfers while searching.
pub async fn search<F>(config: &Config, duration: Duration, mut done: F) -> Result<PeerTable>
where
    F: FnMut(&PeerTable) -> bool,
{
    let discovery = Arc::new(
        DiscoveryService::start(config.discovery_config(0))
            .await
            .context("Failed to start discovery")?,
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn({
        let discovery = Arc::clone(&discovery);
        async move { discovery.run(tx).await }
    });

    let mut peers = PeerTable::new();
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Err(e) = discovery.refresh().await {
                    tracing::warn!("Discovery request failed: {}", e);
                }
            }
            Some(peer) = rx.recv() => {
                if peers.apply(peer) && done(&peers) {
                    break;
                }
            }
            () = &mut deadline => break,
        }
    }

    task.abort();
    Ok(peers)
}

/// Output peers as JSON.
fn output_json_peers(peers: &PeerTable) -> Result<()> {
    let output = serde_json::json!({
        "devices": peers.iter().map(|p| serde_json::json!({
            "name": p.device_name,
            "type": p.device_type,
            "address": p.endpoint.address.to_string(),
            "port": p.endpoint.port,
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Display peers as text table.
fn display_peers(peers: &PeerTable) {
    println!("Devices on Network:");
    println!("{}", "─".repeat(60));
    println!("  {:24}  {:10}  {:20}", "Device", "Type", "Address");
    println!("{}", "─".repeat(60));

    if peers.is_empty() {
        println!("  (no devices found)");
        println!("{}", "─".repeat(60));
        return;
    }

    for peer in peers.iter() {
        println!(
            "  {:24}  {:10}  {:20}",
            truncate_string(&peer.device_name, 24),
            truncate_string(&peer.device_type, 10),
            peer.endpoint.socket_addr()
        );
    }

    println!("{}", "─".repeat(60));
}
