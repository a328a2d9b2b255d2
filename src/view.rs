//! The view: peers and prefix×peer cells for one collector (spec §3, §4.C).
//!
//! Cells are *not* linked to peers or prefixes by pointer (see the
//! "Cyclic ownership" design note) — each peer owns a `BTreeMap` of its
//! own cells keyed by a compact [`PrefixKey`], and each prefix trie node
//! carries the set of peer ids that currently have a cell under it. Prefix-
//! ordered iteration walks the trie and looks cells up per peer;
//! peer-ordered iteration walks a peer's map directly.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ipnet::IpNet;

use crate::origin::Origin;
use crate::peer_registry::{PeerId, PeerSignature};
use crate::prefix_trie::{ipv4_to_bits, ipv6_to_bits, NodeId, PrefixTrie};

/// Address family a prefix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(net: &IpNet) -> Self {
        match net {
            IpNet::V4(_) => Family::V4,
            IpNet::V6(_) => Family::V6,
        }
    }
}

/// Dense key identifying a prefix within the view: which family's trie it
/// lives in, plus the node id within that trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrefixKey {
    pub family: Family,
    pub node: NodeId,
}

/// The BGP peer FSM, spec §3. Only `Established` is ever paired with an
/// active `view_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmState {
    Unknown,
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl std::fmt::Display for FsmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FsmState::Unknown => "unknown",
            FsmState::Idle => "idle",
            FsmState::Connect => "connect",
            FsmState::Active => "active",
            FsmState::OpenSent => "open-sent",
            FsmState::OpenConfirm => "open-confirm",
            FsmState::Established => "established",
        };
        f.write_str(s)
    }
}

/// Per-peer state, spec §3 "Per-peer payload".
#[derive(Debug, Clone)]
pub struct PeerPayload {
    pub signature: PeerSignature,
    pub fsm_state: FsmState,
    pub ref_rib_start_ts: u32,
    pub ref_rib_end_ts: u32,
    pub uc_rib_start_ts: u32,
    pub uc_rib_end_ts: u32,
    pub last_ts: u32,
    pub rib_row_count: u64,
    pub update_count: u64,
    pub positive_mismatch_count: u64,
    pub negative_mismatch_count: u64,
    pub state_msg_count: u64,
    /// ASes seen as an announcement's origin, for cardinality metrics.
    pub announcing_asns: HashSet<u32>,
    pub announced_prefixes: HashSet<PrefixKey>,
    pub withdrawn_prefixes: HashSet<PrefixKey>,
    active: bool,
}

impl PeerPayload {
    fn new(signature: PeerSignature) -> Self {
        Self {
            signature,
            fsm_state: FsmState::Unknown,
            ref_rib_start_ts: 0,
            ref_rib_end_ts: 0,
            uc_rib_start_ts: 0,
            uc_rib_end_ts: 0,
            last_ts: 0,
            rib_row_count: 0,
            update_count: 0,
            positive_mismatch_count: 0,
            negative_mismatch_count: 0,
            state_msg_count: 0,
            announcing_asns: HashSet::new(),
            announced_prefixes: HashSet::new(),
            withdrawn_prefixes: HashSet::new(),
            active: false,
        }
    }

    /// `view_state` — true iff `Active` (spec invariant I1: equivalent to
    /// `fsm_state == Established`).
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Per-(prefix, peer) cell, spec §3 "Per-(prefix,peer) cell payload".
#[derive(Debug, Clone)]
pub struct Cell {
    pub origin_asn: Origin,
    pub last_ts: u32,
    pub uc_delta_ts: u32,
    pub uc_origin_asn: Origin,
    pub announce_count: u64,
    pub withdraw_count: u64,
    active: bool,
}

impl Cell {
    fn new() -> Self {
        Self {
            origin_asn: Origin::Down,
            last_ts: 0,
            uc_delta_ts: 0,
            uc_origin_asn: Origin::Down,
            announce_count: 0,
            withdraw_count: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Clears the live fields back to "nothing live" (invariant I3),
    /// leaving UC fields untouched.
    pub fn wipe_live(&mut self) {
        self.origin_asn = Origin::Down;
        self.last_ts = 0;
        self.active = false;
    }

    /// Clears the UC fields back to "no UC data".
    pub fn wipe_uc(&mut self) {
        self.uc_delta_ts = 0;
        self.uc_origin_asn = Origin::Down;
    }
}

struct PrefixPayload {
    net: IpNet,
    peers: BTreeSet<PeerId>,
}

struct PeerSlot {
    payload: PeerPayload,
    cells: BTreeMap<PrefixKey, Cell>,
}

/// Container of peers and prefix×peer cells for one collector (spec §4.C).
pub struct View {
    /// Nominal start of the current publication interval.
    pub view_time: u32,
    v4: PrefixTrie<u32, PrefixPayload>,
    v6: PrefixTrie<u128, PrefixPayload>,
    peers: Vec<PeerSlot>,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    pub fn new() -> Self {
        Self {
            view_time: 0,
            v4: PrefixTrie::new(),
            v6: PrefixTrie::new(),
            peers: Vec::new(),
        }
    }

    /// Ensures a peer slot exists for `id`, creating it (Unknown, Inactive)
    /// if this is its first appearance in the view.
    pub fn ensure_peer(&mut self, id: PeerId, signature: PeerSignature) -> &mut PeerPayload {
        while self.peers.len() <= id.index() {
            self.peers.push(PeerSlot {
                payload: PeerPayload::new(signature),
                cells: BTreeMap::new(),
            });
        }
        &mut self.peers[id.index()].payload
    }

    pub fn peer(&self, id: PeerId) -> &PeerPayload {
        &self.peers[id.index()].payload
    }

    pub fn peer_mut(&mut self, id: PeerId) -> &mut PeerPayload {
        &mut self.peers[id.index()].payload
    }

    pub fn activate_peer(&mut self, id: PeerId) {
        self.peers[id.index()].payload.active = true;
    }

    pub fn deactivate_peer(&mut self, id: PeerId) {
        self.peers[id.index()].payload.active = false;
    }

    /// Creates the (pfx, peer) cell if absent, without touching an
    /// existing cell's fields. Unlike [`View::add_pfx_peer`], this never
    /// overwrites origin — used by the folder, which sets cell fields
    /// itself after its own out-of-order gate (spec §4.E.3).
    pub fn ensure_cell(&mut self, net: IpNet, peer: PeerId) -> PrefixKey {
        let key = self.get_or_create_prefix(net);
        match key.family {
            Family::V4 => {
                self.v4.payload_mut(key.node).peers.insert(peer);
            }
            Family::V6 => {
                self.v6.payload_mut(key.node).peers.insert(peer);
            }
        }
        self.peers[peer.index()]
            .cells
            .entry(key)
            .or_insert_with(Cell::new);
        key
    }

    pub fn prefix_keys_for_peer(&self, peer: PeerId) -> Vec<PrefixKey> {
        self.peers[peer.index()].cells.keys().copied().collect()
    }

    pub fn iter_peer_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        (0..self.peers.len()).map(|i| PeerId(i as u32 + 1))
    }

    /// Returns the prefix's key, inserting a trie node (with an empty peer
    /// set) if this is the first time any peer has had a cell here.
    pub fn get_or_create_prefix(&mut self, net: IpNet) -> PrefixKey {
        match net {
            IpNet::V4(n) => {
                let bits = ipv4_to_bits(n.addr());
                let len = n.prefix_len();
                let node = match self.v4.search_exact(bits, len) {
                    Some(id) => id,
                    None => self.v4.insert(
                        bits,
                        len,
                        PrefixPayload {
                            net,
                            peers: BTreeSet::new(),
                        },
                    ),
                };
                PrefixKey {
                    family: Family::V4,
                    node,
                }
            }
            IpNet::V6(n) => {
                let bits = ipv6_to_bits(n.addr());
                let len = n.prefix_len();
                let node = match self.v6.search_exact(bits, len) {
                    Some(id) => id,
                    None => self.v6.insert(
                        bits,
                        len,
                        PrefixPayload {
                            net,
                            peers: BTreeSet::new(),
                        },
                    ),
                };
                PrefixKey {
                    family: Family::V6,
                    node,
                }
            }
        }
    }

    pub fn prefix_net(&self, key: PrefixKey) -> IpNet {
        match key.family {
            Family::V4 => self.v4.payload(key.node).net,
            Family::V6 => self.v6.payload(key.node).net,
        }
    }

    /// Creates the (pfx, peer) cell if absent, sets its origin, and leaves
    /// it inactive; callers activate explicitly (spec §4.C).
    pub fn add_pfx_peer(&mut self, net: IpNet, peer: PeerId, origin: Origin) -> PrefixKey {
        let key = self.get_or_create_prefix(net);
        match key.family {
            Family::V4 => {
                self.v4.payload_mut(key.node).peers.insert(peer);
            }
            Family::V6 => {
                self.v6.payload_mut(key.node).peers.insert(peer);
            }
        }
        let slot = &mut self.peers[peer.index()];
        let cell = slot.cells.entry(key).or_insert_with(Cell::new);
        cell.origin_asn = origin;
        key
    }

    pub fn cell(&self, peer: PeerId, key: PrefixKey) -> Option<&Cell> {
        self.peers[peer.index()].cells.get(&key)
    }

    pub fn cell_mut(&mut self, peer: PeerId, key: PrefixKey) -> Option<&mut Cell> {
        self.peers[peer.index()].cells.get_mut(&key)
    }

    pub fn activate_cell(&mut self, peer: PeerId, key: PrefixKey) {
        if let Some(c) = self.cell_mut(peer, key) {
            c.active = true;
        }
    }

    pub fn deactivate_cell(&mut self, peer: PeerId, key: PrefixKey) {
        if let Some(c) = self.cell_mut(peer, key) {
            c.active = false;
        }
    }

    /// Iterates every cell belonging to `peer`, in prefix-key order.
    pub fn cells_for_peer(&self, peer: PeerId) -> impl Iterator<Item = (PrefixKey, &Cell)> {
        self.peers[peer.index()].cells.iter().map(|(k, c)| (*k, c))
    }

    pub fn cells_for_peer_mut(
        &mut self,
        peer: PeerId,
    ) -> impl Iterator<Item = (PrefixKey, &mut Cell)> {
        self.peers[peer.index()]
            .cells
            .iter_mut()
            .map(|(k, c)| (*k, c))
    }

    /// Iterates every peer that currently has a cell for `key`, in peer-id
    /// order, by walking the prefix node's peer set.
    pub fn cells_for_prefix(&self, key: PrefixKey) -> impl Iterator<Item = (PeerId, &Cell)> + '_ {
        let peers: Vec<PeerId> = match key.family {
            Family::V4 => self.v4.payload(key.node).peers.iter().copied().collect(),
            Family::V6 => self.v6.payload(key.node).peers.iter().copied().collect(),
        };
        peers
            .into_iter()
            .filter_map(move |p| self.cell(p, key).map(|c| (p, c)))
    }

    /// Counts how many Active cells `peer` has in family `fam` — used by
    /// the full-feed predicate (spec §4.G).
    pub fn active_cell_count(&self, peer: PeerId, fam: Family) -> usize {
        self.peers[peer.index()]
            .cells
            .iter()
            .filter(|(k, c)| k.family == fam && c.active)
            .count()
    }
}
