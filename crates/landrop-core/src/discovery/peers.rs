//! Consumer-side table of live peers.

use std::collections::BTreeMap;
use std::net::IpAddr;

use super::DiscoveredPeer;

/// Peers currently accepting transfers, keyed by address.
///
/// A repeated announcement from the same address replaces the entry. An
/// announcement with port `0` means the peer withdrew from the set of
/// connectable devices and removes it.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: BTreeMap<IpAddr, DiscoveredPeer>,
}

impl PeerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an announcement; returns whether the table changed.
    pub fn apply(&mut self, peer: DiscoveredPeer) -> bool {
        let address = peer.endpoint.address;

        if !peer.endpoint.is_connectable() {
            return self.peers.remove(&address).is_some();
        }
        if self.peers.get(&address) == Some(&peer) {
            return false;
        }
        self.peers.insert(address, peer);
        true
    }

    /// Look up a peer by address.
    #[must_use]
    pub fn get(&self, address: &IpAddr) -> Option<&DiscoveredPeer> {
        self.peers.get(address)
    }

    /// First peer announcing exactly `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&DiscoveredPeer> {
        self.peers.values().find(|peer| peer.device_name == name)
    }

    /// Iterate over peers ordered by address.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredPeer> {
        self.peers.values()
    }

    /// Number of connectable peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Endpoint;

    fn peer(name: &str, address: &str, port: u16) -> DiscoveredPeer {
        DiscoveredPeer {
            device_name: name.to_string(),
            device_type: "linux".to_string(),
            endpoint: Endpoint {
                address: address.parse().unwrap(),
                port,
            },
        }
    }

    #[test]
    fn test_insert_and_update() {
        let mut table = PeerTable::new();

        assert!(table.apply(peer("laptop", "10.0.0.2", 4000)));
        assert!(!table.apply(peer("laptop", "10.0.0.2", 4000)));
        assert!(table.apply(peer("renamed", "10.0.0.2", 4001)));

        assert_eq!(table.len(), 1);
        let entry = table.get(&"10.0.0.2".parse().unwrap()).unwrap();
        assert_eq!(entry.device_name, "renamed");
        assert_eq!(entry.endpoint.port, 4001);
    }

    #[test]
    fn test_port_zero_removes() {
        let mut table = PeerTable::new();
        table.apply(peer("laptop", "10.0.0.2", 4000));
        table.apply(peer("phone", "10.0.0.3", 4000));

        assert!(table.apply(peer("laptop", "10.0.0.2", 0)));
        assert!(!table.apply(peer("ghost", "10.0.0.9", 0)));
        assert_eq!(table.len(), 1);
        assert!(table.find_by_name("laptop").is_none());
        assert!(table.find_by_name("phone").is_some());
    }

    #[test]
    fn test_iteration_order() {
        let mut table = PeerTable::new();
        table.apply(peer("b", "10.0.0.9", 1));
        table.apply(peer("a", "10.0.0.1", 1));

        let names: Vec<_> = table.iter().map(|p| p.device_name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
