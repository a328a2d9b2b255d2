//! Bidirectional map between a peer's signature and its compact slot id
//! within a collector's [`crate::view::View`] (spec §4.B).
//!
//! A peer is identified externally by `(collector, peer_ip, peer_asn)`.
//! Internally the view only ever stores a small integer `PeerId` per cell,
//! so growing the peer set never touches existing cells.

use std::collections::HashMap;
use std::net::IpAddr;

/// Compact id for a peer within one collector's view, allocated
/// sequentially from 1 (spec §3, §4.B) — `0` is never a valid id, so it
/// stays free for collaborators to use as a sentinel for "no peer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub(crate) u32);

impl PeerId {
    /// Zero-based index into [`crate::view::View`]'s per-peer slot vector.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// The externally-visible identity of a peer: its session address and the
/// ASN it announced in OPEN. Two sessions from the same IP but different
/// ASNs (e.g. across a renumbering) are distinct peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerSignature {
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
}

/// Maps peer signatures to dense ids and back. Ids are never reused or
/// reclaimed within the lifetime of a registry: once assigned, a
/// signature keeps the same id even if the peer later goes permanently
/// down, so long-lived references (e.g. in in-flight sink output) never
/// dangle.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    by_signature: HashMap<PeerSignature, PeerId>,
    by_id: Vec<PeerSignature>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Looks up `sig`'s id, assigning a fresh one if this is the first
    /// time this collector has seen it.
    pub fn get_or_insert(&mut self, sig: PeerSignature) -> PeerId {
        if let Some(&id) = self.by_signature.get(&sig) {
            return id;
        }
        let id = PeerId(self.by_id.len() as u32 + 1);
        self.by_id.push(sig);
        self.by_signature.insert(sig, id);
        id
    }

    pub fn get(&self, sig: &PeerSignature) -> Option<PeerId> {
        self.by_signature.get(sig).copied()
    }

    pub fn signature(&self, id: PeerId) -> PeerSignature {
        self.by_id[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerId, PeerSignature)> + '_ {
        self.by_id
            .iter()
            .enumerate()
            .map(|(idx, &sig)| (PeerId(idx as u32 + 1), sig))
    }
}
