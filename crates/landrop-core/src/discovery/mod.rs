//! Network discovery for LANDrop.
//!
//! A stateless request/response presence protocol over UDP broadcast.
//!
//! ## Protocol
//!
//! - Port: 52637 (UDP), the same on every device
//! - On start a device broadcasts its announcement once
//! - A peer picker broadcasts requests (about once a second) and every
//!   device answers with a unicast announcement
//!
//! ## Datagrams
//!
//! ```json
//! {"request": true}
//! {"request": false, "device_name": "Marcus-Laptop", "device_type": "linux", "port": 41234}
//! ```
//!
//! `port` is `0` when the device is not accepting transfers. Datagrams from
//! the host's own addresses and datagrams that do not parse are dropped.

mod peers;

pub use peers::PeerTable;

use std::collections::BTreeSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4};

use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Largest datagram the receive loop accepts.
const MAX_DATAGRAM_SIZE: usize = 4096;

/// Settings for the discovery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Discovery port (UDP)
    pub port: u16,
    /// Name announced to peers
    pub device_name: String,
    /// Device type announced to peers
    pub device_type: String,
    /// Transfer port announced while discoverable
    pub listen_port: u16,
    /// Whether the transfer port is announced at all
    pub discoverable: bool,
}

impl DiscoveryConfig {
    /// Discoverable configuration for the well-known port.
    pub fn new(device_name: impl Into<String>, listen_port: u16) -> Self {
        Self {
            port: crate::DISCOVERY_PORT,
            device_name: device_name.into(),
            device_type: crate::device_type().to_string(),
            listen_port,
            discoverable: true,
        }
    }

    /// The port put into announcements: `0` while not discoverable.
    #[must_use]
    pub const fn announced_port(&self) -> u16 {
        if self.discoverable {
            self.listen_port
        } else {
            0
        }
    }
}

/// Where a discovered peer accepts transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Peer address
    pub address: IpAddr,
    /// Transfer port, `0` when not accepting connections
    pub port: u16,
}

impl Endpoint {
    /// Whether the peer currently accepts connections.
    #[must_use]
    pub const fn is_connectable(&self) -> bool {
        self.port != 0
    }

    /// Socket address to connect to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// A peer surfaced by an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Peer's device name
    pub device_name: String,
    /// Peer's device type (may be empty)
    pub device_type: String,
    /// Where the peer accepts transfers
    pub endpoint: Endpoint,
}

/// What to do with a received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramAction {
    /// Send these bytes back to the source
    Reply(Vec<u8>),
    /// Surface a peer to the consumer
    Discovered(DiscoveredPeer),
    /// Drop silently
    Ignore,
}

/// Limited broadcast plus the broadcast address of every non-loopback IPv4
/// interface.
pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
    let mut addresses = vec![Ipv4Addr::BROADCAST];

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            for interface in interfaces.iter().filter(|i| !i.is_loopback()) {
                if let if_addrs::IfAddr::V4(v4) = &interface.addr {
                    if let Some(broadcast) = v4.broadcast {
                        if !addresses.contains(&broadcast) {
                            addresses.push(broadcast);
                        }
                    }
                }
            }
        }
        Err(e) => tracing::warn!("Failed to list network interfaces: {}", e),
    }

    addresses
}

/// Every address of this host, loopback included.
pub fn local_addresses() -> Vec<IpAddr> {
    let mut addresses: BTreeSet<IpAddr> = [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ]
    .into_iter()
    .collect();

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => addresses.extend(interfaces.iter().map(if_addrs::Interface::ip)),
        Err(e) => tracing::warn!("Failed to list network interfaces: {}", e),
    }

    addresses.into_iter().collect()
}

fn encode_announcement(config: &DiscoveryConfig) -> Vec<u8> {
    json!({
        "request": false,
        "device_name": config.device_name,
        "device_type": config.device_type,
        "port": config.announced_port(),
    })
    .to_string()
    .into_bytes()
}

fn encode_request() -> Vec<u8> {
    json!({ "request": true }).to_string().into_bytes()
}

/// UDP presence service: answers requests and surfaces announcements.
#[derive(Debug)]
pub struct DiscoveryService {
    socket: UdpSocket,
    config: DiscoveryConfig,
    listening: bool,
    local_addresses: Vec<IpAddr>,
    targets: Option<Vec<SocketAddr>>,
}

impl DiscoveryService {
    /// Bind the discovery port and broadcast this device's announcement.
    ///
    /// Failing to bind the well-known port is not fatal: the service falls
    /// back to an ephemeral port, so it can still solicit and receive
    /// replies but is not discoverable by others.
    ///
    /// # Errors
    ///
    /// Returns an error only if no UDP socket can be bound at all.
    pub async fn start(config: DiscoveryConfig) -> Result<Self> {
        let (socket, listening) =
            match bind_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port)) {
                Ok(socket) => (socket, true),
                Err(e) => {
                    tracing::warn!(
                        "Unable to bind to port {}, this device won't be discoverable: {}",
                        config.port,
                        e
                    );
                    (
                        bind_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?,
                        false,
                    )
                }
            };

        let service = Self {
            socket,
            config,
            listening,
            local_addresses: local_addresses(),
            targets: None,
        };
        service.announce().await;
        Ok(service)
    }

    /// Bind a specific address without announcing anything.
    pub fn bind_to(addr: SocketAddrV4, config: DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            socket: bind_socket(addr)?,
            config,
            listening: true,
            local_addresses: local_addresses(),
            targets: None,
        })
    }

    /// Replace the set of addresses treated as this host.
    #[must_use]
    pub fn with_local_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.local_addresses = addresses;
        self
    }

    /// Send announcements and requests to fixed addresses instead of the
    /// broadcast addresses.
    #[must_use]
    pub fn with_targets(mut self, targets: Vec<SocketAddr>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Whether the discovery port itself is bound.
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// The current settings.
    #[must_use]
    pub const fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn targets(&self) -> Vec<SocketAddr> {
        self.targets.clone().unwrap_or_else(|| {
            broadcast_addresses()
                .into_iter()
                .map(|ip| SocketAddr::V4(SocketAddrV4::new(ip, self.config.port)))
                .collect()
        })
    }

    async fn send_to_all(&self, datagram: &[u8]) -> usize {
        let mut sent = 0;
        for target in self.targets() {
            match self.socket.send_to(datagram, target).await {
                Ok(_) => sent += 1,
                Err(e) => tracing::warn!("Failed to send discovery datagram to {}: {}", target, e),
            }
        }
        sent
    }

    /// Broadcast this device's announcement.
    pub async fn announce(&self) {
        let sent = self.send_to_all(&encode_announcement(&self.config)).await;
        tracing::debug!(sent, port = self.config.announced_port(), "announcement broadcast");
    }

    /// Broadcast a request so every peer re-announces itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the request reached no address at all.
    pub async fn refresh(&self) -> Result<()> {
        if self.send_to_all(&encode_request()).await == 0 {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "discovery request could not be sent",
            )));
        }
        Ok(())
    }

    /// Decide what to do with one datagram.
    pub fn handle_datagram(&self, data: &[u8], source: SocketAddr) -> DatagramAction {
        if self.local_addresses.contains(&source.ip()) {
            return DatagramAction::Ignore;
        }

        let Ok(value) = serde_json::from_slice::<Value>(data) else {
            tracing::debug!(%source, "dropping malformed discovery datagram");
            return DatagramAction::Ignore;
        };

        match value.get("request").and_then(Value::as_bool) {
            Some(true) => DatagramAction::Reply(encode_announcement(&self.config)),
            Some(false) => parse_announcement(&value, source.ip())
                .map_or(DatagramAction::Ignore, DatagramAction::Discovered),
            None => DatagramAction::Ignore,
        }
    }

    /// Receive datagrams until `events` is closed, replying to requests and
    /// forwarding announcements.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket fails.
    pub async fn run(&self, events: mpsc::UnboundedSender<DiscoveredPeer>) -> Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, source) = tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                    Err(e) => return Err(e.into()),
                },
                () = events.closed() => return Ok(()),
            };

            match self.handle_datagram(&buf[..len], source) {
                DatagramAction::Reply(reply) => {
                    if let Err(e) = self.socket.send_to(&reply, source).await {
                        tracing::warn!("Failed to answer discovery request from {}: {}", source, e);
                    }
                }
                DatagramAction::Discovered(peer) => {
                    tracing::debug!(name = %peer.device_name, endpoint = ?peer.endpoint, "peer announced");
                    if events.send(peer).is_err() {
                        return Ok(());
                    }
                }
                DatagramAction::Ignore => {}
            }
        }
    }
}

fn parse_announcement(value: &Value, address: IpAddr) -> Option<DiscoveredPeer> {
    let device_name = value.get("device_name")?.as_str()?.to_string();
    let port = parse_port(value.get("port")?)?;
    let device_type = value
        .get("device_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(DiscoveredPeer {
        device_name,
        device_type,
        endpoint: Endpoint { address, port },
    })
}

/// Ports may arrive as floats; they are truncated toward zero.
fn parse_port(value: &Value) -> Option<u16> {
    if let Some(port) = value.as_u64() {
        return u16::try_from(port).ok();
    }
    let port = value.as_f64()?.trunc();
    if port.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&port) {
        Some(port as u16)
    } else {
        None
    }
}

fn bind_socket(addr: SocketAddrV4) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_broadcast(true)?;
    socket.set_reuse_address(true)?;

    #[cfg(target_os = "macos")]
    socket.set_reuse_port(true)?;

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: &str = "192.168.1.20:52637";

    fn service() -> DiscoveryService {
        let mut config = DiscoveryConfig::new("desk", 41234);
        config.device_type = "linux".into();
        DiscoveryService::bind_to(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), config)
            .unwrap()
            .with_local_addresses(vec!["192.168.1.10".parse().unwrap()])
    }

    #[tokio::test]
    async fn test_request_gets_reply() {
        let service = service();
        let action = service.handle_datagram(br#"{"request":true}"#, PEER.parse().unwrap());

        let DatagramAction::Reply(reply) = action else {
            panic!("expected a reply, got {action:?}");
        };
        let value: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(value["request"], false);
        assert_eq!(value["device_name"], "desk");
        assert_eq!(value["device_type"], "linux");
        assert_eq!(value["port"], 41234);
    }

    #[tokio::test]
    async fn test_reply_hides_port_when_not_discoverable() {
        let mut config = DiscoveryConfig::new("desk", 41234);
        config.discoverable = false;
        let service = DiscoveryService::bind_to(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), config)
            .unwrap()
            .with_local_addresses(Vec::new());

        let DatagramAction::Reply(reply) =
            service.handle_datagram(br#"{"request":true}"#, PEER.parse().unwrap())
        else {
            panic!("expected a reply");
        };
        let value: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(value["port"], 0);
    }

    #[tokio::test]
    async fn test_announcement_is_discovered() {
        let service = service();
        let action = service.handle_datagram(
            br#"{"request":false,"device_name":"phone","device_type":"android","port":5000}"#,
            PEER.parse().unwrap(),
        );

        assert_eq!(
            action,
            DatagramAction::Discovered(DiscoveredPeer {
                device_name: "phone".into(),
                device_type: "android".into(),
                endpoint: Endpoint {
                    address: "192.168.1.20".parse().unwrap(),
                    port: 5000,
                },
            })
        );
    }

    #[tokio::test]
    async fn test_fractional_port_is_truncated() {
        let service = service();
        let source: SocketAddr = PEER.parse().unwrap();

        for (data, expected) in [
            (&br#"{"request":false,"device_name":"a","port":5000.9}"#[..], 5000),
            (&br#"{"request":false,"device_name":"a","port":-0.5}"#[..], 0),
        ] {
            let DatagramAction::Discovered(peer) = service.handle_datagram(data, source) else {
                panic!("expected a peer for {}", String::from_utf8_lossy(data));
            };
            assert_eq!(peer.endpoint.port, expected);
        }
    }

    #[tokio::test]
    async fn test_self_suppression() {
        let service = service();
        let own: SocketAddr = "192.168.1.10:52637".parse().unwrap();

        assert_eq!(
            service.handle_datagram(br#"{"request":true}"#, own),
            DatagramAction::Ignore
        );
        assert_eq!(
            service.handle_datagram(
                br#"{"request":false,"device_name":"me","device_type":"","port":1}"#,
                own
            ),
            DatagramAction::Ignore
        );
    }

    #[tokio::test]
    async fn test_malformed_datagrams_ignored() {
        let service = service();
        let source: SocketAddr = PEER.parse().unwrap();

        let cases: [&[u8]; 10] = [
            b"garbage",
            br#"{"request":"yes"}"#,
            br#"{"device_name":"x","port":1}"#,
            br#"{"request":false,"port":1}"#,
            br#"{"request":false,"device_name":"x"}"#,
            br#"{"request":false,"device_name":"x","port":70000}"#,
            br#"{"request":false,"device_name":"x","port":-1}"#,
            br#"{"request":false,"device_name":"x","port":65536.5}"#,
            br#"{"request":false,"device_name":"x","port":"80"}"#,
            br#"[]"#,
        ];
        for data in cases {
            assert_eq!(
                service.handle_datagram(data, source),
                DatagramAction::Ignore,
                "{}",
                String::from_utf8_lossy(data)
            );
        }
    }

    #[test]
    fn test_announced_port() {
        let mut config = DiscoveryConfig::new("x", 9000);
        assert_eq!(config.announced_port(), 9000);
        config.discoverable = false;
        assert_eq!(config.announced_port(), 0);
    }

    #[test]
    fn test_broadcast_addresses_include_limited_broadcast() {
        let addresses = broadcast_addresses();
        assert_eq!(addresses[0], Ipv4Addr::BROADCAST);
        assert!(addresses.iter().all(|a| !a.is_loopback()));
    }

    #[test]
    fn test_local_addresses_include_loopback() {
        let addresses = local_addresses();
        assert!(addresses.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn test_endpoint() {
        let endpoint = Endpoint {
            address: "10.0.0.2".parse().unwrap(),
            port: 0,
        };
        assert!(!endpoint.is_connectable());
        assert_eq!(endpoint.socket_addr().to_string(), "10.0.0.2:0");
    }
}
