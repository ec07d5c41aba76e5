//! TCP plumbing: accepting and opening transfer connections.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::file::SourceFile;

use super::driver::drive;
use super::session::{TransferRole, TransferSession};
use super::{Outcome, Receiver, Sender, SessionConfig, SessionEvent, TransferDirection};

/// A session running on its own task.
#[derive(Debug)]
pub struct SessionHandle {
    peer: SocketAddr,
    direction: TransferDirection,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    decisions: mpsc::UnboundedSender<bool>,
    task: JoinHandle<Outcome>,
}

impl SessionHandle {
    /// Spawn a task driving `session` over `stream`.
    pub fn spawn<S, R>(
        stream: S,
        peer: SocketAddr,
        session: TransferSession<R>,
        completion_grace: Duration,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        R: TransferRole + Send + 'static,
    {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (decisions, decisions_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(drive(
            stream,
            session,
            events_tx,
            Some(decisions_rx),
            completion_grace,
        ));

        Self {
            peer,
            direction: R::DIRECTION,
            events,
            decisions,
            task,
        }
    }

    /// Address of the remote device.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether this end sends or receives.
    #[must_use]
    pub const fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Wait for the next session event.
    ///
    /// Returns `None` after the `Ended` event has been delivered.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Accept or reject the pending offer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] on a sending session or once the
    /// session has ended.
    pub fn respond(&self, accepted: bool) -> Result<()> {
        if self.direction == TransferDirection::Send {
            return Err(Error::InvalidOperation(
                "only a receiving session can answer an offer".to_string(),
            ));
        }
        self.decisions
            .send(accepted)
            .map_err(|_| Error::InvalidOperation("session already ended".to_string()))
    }

    /// Wait for the session to end and return its outcome.
    pub async fn join(self) -> Result<Outcome> {
        self.task
            .await
            .map_err(|e| Error::InvalidOperation(format!("session task failed: {e}")))
    }
}

/// Listens for incoming transfers.
#[derive(Debug)]
pub struct TransferServer {
    listener: TcpListener,
    download_path: PathBuf,
    completion_grace: Duration,
}

impl TransferServer {
    /// Bind the listening socket; port `0` lets the OS pick one.
    pub async fn bind(
        port: u16,
        download_path: impl Into<PathBuf>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        tracing::info!(addr = %listener.local_addr()?, "transfer server listening");

        Ok(Self {
            listener,
            download_path: download_path.into(),
            completion_grace: config.completion_grace,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The bound port, to be announced over discovery.
    pub fn local_port(&self) -> Result<u16> {
        Ok(self.local_addr()?.port())
    }

    /// Accept the next connection and start a receiving session on it.
    pub async fn accept(&self) -> Result<SessionHandle> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer, "incoming connection");

        let session = TransferSession::new(Receiver::new(self.download_path.clone()));
        Ok(SessionHandle::spawn(
            stream,
            peer,
            session,
            self.completion_grace,
        ))
    }
}

/// Connect to a receiver and start offering `paths`.
///
/// Every file is opened before connecting, so unreadable files fail early.
pub async fn send_files(
    addr: SocketAddr,
    paths: &[PathBuf],
    config: &SessionConfig,
) -> Result<SessionHandle> {
    let files = paths
        .iter()
        .map(|path| SourceFile::open(path))
        .collect::<Result<Vec<_>>>()?;
    let sender = Sender::new(
        config.device_name.clone(),
        config.device_type.clone(),
        files,
        config.chunk_size,
    )?;

    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout.as_secs()))??;
    stream.set_nodelay(true)?;
    tracing::info!(peer = %addr, "connected");

    Ok(SessionHandle::spawn(
        stream,
        addr,
        TransferSession::new(sender),
        config.completion_grace,
    ))
}
