//! Receive command implementation.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use landrop_core::discovery::{DiscoveredPeer, DiscoveryService};
use landrop_core::file::format_size;
use landrop_core::transfer::{IncomingOffer, SessionEvent, SessionHandle, TransferServer};

use super::ReceiveArgs;
use crate::ui::{self, SessionView};

/// Run the receive command.
pub async fn run(args: ReceiveArgs) -> Result<()> {
    let mut config = super::load_config();
    if args.hidden {
        config.network.discoverable = false;
    }

    let download_path = args
        .output
        .clone()
        .unwrap_or_else(|| config.general.download_path.clone());
    let port = args.port.unwrap_or(config.network.listen_port);

    let server = TransferServer::bind(port, download_path.clone(), &config.session_config())
        .await
        .context("Failed to start transfer server")?;
    let listen_port = server.local_port()?;

    let discovery = Arc::new(
        DiscoveryService::start(config.discovery_config(listen_port))
            .await
            .context("Failed to start discovery")?,
    );
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
    let discovery_task = tokio::spawn({
        let discovery = Arc::clone(&discovery);
        async move { discovery.run(peer_tx).await }
    });

    if !args.quiet {
        ui::print_header();
        println!("  Device name:  {}", config.general.device_name);
        println!("  Listening on: port {}", listen_port);
        println!("  Saving to:    {}", download_path.display());
        if !discovery.is_listening() {
            println!();
            println!("  Discovery port is in use; other devices must connect by address.");
        }
        println!();
        println!("  Waiting for files... (Ctrl+C to stop)");
        println!();
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };
    serve(&server, &args, &download_path, &mut peer_rx, shutdown).await?;

    discovery_task.abort();
    if !args.quiet {
        println!();
        println!("  Stopped.");
    }
    Ok(())
}

/// Accept sessions one at a time until `shutdown` resolves.
///
/// Shutdown is honoured while a session is running as well as between
/// sessions.
async fn serve<F>(
    server: &TransferServer,
    args: &ReceiveArgs,
    download_path: &Path,
    peer_rx: &mut mpsc::UnboundedReceiver<DiscoveredPeer>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(handle) => tokio::select! {
                    result = receive_one(handle, args, download_path) => result?,
                    () = &mut shutdown => {
                        tracing::info!("Shutting down during transfer");
                        break;
                    }
                },
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            },
            Some(peer) = peer_rx.recv() => {
                tracing::debug!(name = %peer.device_name, endpoint = ?peer.endpoint, "peer seen");
            }
            () = &mut shutdown => break,
        }
    }

    Ok(())
}

/// Run one incoming session to its end.
async fn receive_one(
    mut handle: SessionHandle,
    args: &ReceiveArgs,
    download_path: &Path,
) -> Result<()> {
    let peer = handle.peer();
    let mut view = SessionView::new(args.quiet);
    if !args.quiet {
        println!("  Incoming connection from {}", peer);
    }

    while let Some(event) = handle.next_event().await {
        if let SessionEvent::Offer(offer) = &event {
            if !args.quiet {
                display_offer(offer, download_path);
            }
            let accepted = if args.batch {
                true
            } else {
                ui::confirm("Accept transfer?").await?
            };
            if let Err(e) = handle.respond(accepted) {
                tracing::debug!("Decision not delivered: {}", e);
            }
        }
        view.show(&event);
    }

    let outcome = handle.join().await?;
    tracing::info!(%peer, %outcome, "session ended");
    Ok(())
}

fn display_offer(offer: &IncomingOffer, download_path: &Path) {
    let from = if offer.device_type.is_empty() {
        offer.device_name.clone()
    } else {
        format!("{} ({})", offer.device_name, offer.device_type)
    };

    println!("  {} wants to send you:", from);
    println!();
    for file in &offer.files {
        println!("    {}  {}", file.filename, format_size(file.size));
    }
    println!();
    println!(
        "  {} file(s), {} to {}",
        offer.files.len(),
        format_size(offer.total_size),
        download_path.display()
    );
    println!();
}
