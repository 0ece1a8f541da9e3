//! Peer registry with MAC-or-socket reconciliation
//!
//! Peers are keyed by MAC, but an edge may first be learned by address
//! only (null MAC). Once traffic reveals the real MAC, the entry is
//! re-keyed: because the MAC is the hash key it must be removed and
//! reinserted, never mutated in place.

use std::collections::HashMap;

use tracing::debug;

use crate::mac::Mac;
use crate::sock::SockAddr;

/// Supernode selection score. Opaque to the runtime core; selection
/// strategies elsewhere order peers by it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionCriterion(pub u64);

/// A known edge or supernode
#[derive(Clone, Debug)]
pub struct Peer {
    mac: Mac,
    /// Current socket address
    pub sock: SockAddr,
    /// Selection score, reset to the default on creation
    pub selection: SelectionCriterion,
    /// Original `host:port` spec, present for supernodes named by name
    pub hostname: Option<String>,
}

impl Peer {
    pub fn new(mac: Mac, sock: SockAddr) -> Self {
        Self {
            mac,
            sock,
            selection: SelectionCriterion::default(),
            hostname: None,
        }
    }

    pub fn with_hostname(mac: Mac, sock: SockAddr, hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Self::new(mac, sock)
        }
    }

    /// The registry key. Only the registry may change it (re-keying).
    pub fn mac(&self) -> Mac {
        self.mac
    }
}

/// Admission policy for [`PeerRegistry::add_or_find`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddPolicy {
    /// Insert a fresh peer on a complete miss
    Add,
    /// Lookup only
    NoAdd,
}

/// What [`PeerRegistry::add_or_find`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// An existing peer was returned (possibly re-keyed)
    Existing,
    /// A fresh peer was inserted
    Added,
}

/// MAC-keyed store of known peers
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<Mac, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, mac: &Mac) -> Option<&Peer> {
        self.peers.get(mac)
    }

    pub fn get_mut(&mut self, mac: &Mac) -> Option<&mut Peer> {
        self.peers.get_mut(mac)
    }

    /// Insert a peer under its own MAC, replacing any previous holder.
    pub fn insert(&mut self, peer: Peer) -> Option<Peer> {
        self.peers.insert(peer.mac, peer)
    }

    pub fn remove(&mut self, mac: &Mac) -> Option<Peer> {
        self.peers.remove(mac)
    }

    pub fn values(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    /// Find a peer by MAC or by socket identity, optionally inserting.
    ///
    /// Lookup order:
    /// 1. by `mac`, when non-null (the socket is left untouched on a hit);
    /// 2. by socket equality; a hit with a non-null `mac` promotes the
    ///    address-only entry: the peer is removed, re-keyed and
    ///    reinserted under the discovered MAC;
    /// 3. on a complete miss with [`AddPolicy::Add`], a fresh peer with
    ///    the default selection criterion is inserted.
    pub fn add_or_find(
        &mut self,
        sock: &SockAddr,
        mac: Mac,
        policy: AddPolicy,
    ) -> Option<(&mut Peer, AddOutcome)> {
        if !mac.is_null() && self.peers.contains_key(&mac) {
            return self
                .peers
                .get_mut(&mac)
                .map(|peer| (peer, AddOutcome::Existing));
        }

        let by_sock = self
            .peers
            .iter()
            .find(|(_, peer)| peer.sock == *sock)
            .map(|(key, _)| *key);

        if let Some(key) = by_sock {
            if !mac.is_null() {
                // the MAC is the hash key: remove, re-key, reinsert
                if let Some(mut peer) = self.peers.remove(&key) {
                    debug!(old = %key, new = %mac, "re-keying peer after MAC discovery");
                    peer.mac = mac;
                    self.peers.insert(mac, peer);
                }
                return self
                    .peers
                    .get_mut(&mac)
                    .map(|peer| (peer, AddOutcome::Existing));
            }
            return self
                .peers
                .get_mut(&key)
                .map(|peer| (peer, AddOutcome::Existing));
        }

        if policy == AddPolicy::Add {
            self.peers.insert(mac, Peer::new(mac, *sock));
            return self
                .peers
                .get_mut(&mac)
                .map(|peer| (peer, AddOutcome::Added));
        }

        None
    }

    /// Store `sock` on the peer carrying `hostname`. Used by resolver
    /// publication; returns false when no such peer exists.
    pub fn set_sock_by_hostname(&mut self, hostname: &str, sock: SockAddr) -> bool {
        for peer in self.peers.values_mut() {
            if peer.hostname.as_deref() == Some(hostname) {
                peer.sock = sock;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sock(last: u8, port: u16) -> SockAddr {
        SockAddr::V4 {
            addr: [10, 0, 0, last],
            port,
        }
    }

    #[test]
    fn test_lookup_by_mac_keeps_socket() {
        let mut reg = PeerRegistry::new();
        let mac = Mac::new([2, 0, 0, 0, 0, 1]);
        reg.insert(Peer::new(mac, sock(1, 7777)));

        let (peer, outcome) = reg
            .add_or_find(&sock(9, 9999), mac, AddPolicy::NoAdd)
            .unwrap();
        assert_eq!(outcome, AddOutcome::Existing);
        // a MAC hit never updates the socket
        assert_eq!(peer.sock, sock(1, 7777));
    }

    #[test]
    fn test_mac_discovery_rekeys_address_only_peer() {
        let mut reg = PeerRegistry::new();
        let s = sock(1, 7777);

        let (_, outcome) = reg.add_or_find(&s, Mac::NULL, AddPolicy::Add).unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(reg.len(), 1);

        let mac = Mac::new([2, 0, 0, 0, 0, 1]);
        let (peer, outcome) = reg.add_or_find(&s, mac, AddPolicy::NoAdd).unwrap();
        assert_eq!(outcome, AddOutcome::Existing);
        assert_eq!(peer.mac(), mac);
        assert_eq!(peer.sock, s);

        // one peer, now keyed by the discovered MAC
        assert_eq!(reg.len(), 1);
        assert!(reg.get(&mac).is_some());
        assert!(reg.get(&Mac::NULL).is_none());
    }

    #[test]
    fn test_no_add_misses() {
        let mut reg = PeerRegistry::new();
        assert!(reg
            .add_or_find(&sock(1, 7777), Mac::NULL, AddPolicy::NoAdd)
            .is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_add_inserts_with_default_criterion() {
        let mut reg = PeerRegistry::new();
        let mac = Mac::new([2, 0, 0, 0, 0, 9]);
        let (peer, outcome) = reg
            .add_or_find(&sock(3, 1234), mac, AddPolicy::Add)
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(peer.selection, SelectionCriterion::default());
        assert_eq!(reg.get(&mac).unwrap().sock, sock(3, 1234));
    }

    #[test]
    fn test_sock_hit_with_null_mac_keeps_key() {
        let mut reg = PeerRegistry::new();
        let mac = Mac::new([2, 0, 0, 0, 0, 1]);
        reg.insert(Peer::new(mac, sock(1, 7777)));

        let (peer, _) = reg
            .add_or_find(&sock(1, 7777), Mac::NULL, AddPolicy::NoAdd)
            .unwrap();
        assert_eq!(peer.mac(), mac);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_set_sock_by_hostname() {
        let mut reg = PeerRegistry::new();
        let mac = Mac::new([2, 0, 0, 0, 0, 1]);
        reg.insert(Peer::with_hostname(mac, SockAddr::Invalid, "sn.example.com:7777"));

        assert!(reg.set_sock_by_hostname("sn.example.com:7777", sock(5, 7777)));
        assert_eq!(reg.get(&mac).unwrap().sock, sock(5, 7777));
        assert!(!reg.set_sock_by_hostname("unknown:1", sock(5, 7777)));
    }
}
