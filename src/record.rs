//! External record/element shapes the engine consumes (spec §6 "Record
//! source interface"). Acquisition and decoding from the wire are an
//! external collaborator's job; this module only defines the shape that
//! collaborator hands to [`crate::engine::Engine::ingest_record`].

use std::net::IpAddr;

use ipnet::IpNet;

use crate::origin::AsSegment;
use crate::view::FsmState;

/// Outcome the source attaches to a record before the engine ever looks
/// at its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Valid,
    CorruptedSource,
    CorruptedRecord,
    FilteredSource,
    EmptySource,
}

/// Which kind of data this record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpType {
    Rib,
    Updates,
}

/// Position of this record within its dump: RIB records carry `Start`/
/// `Middle`/`End` markers the reconciler keys off of (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpPos {
    Start,
    Middle,
    End,
}

/// One decoded record from a collector, carrying a finite sequence of
/// elements. Producing elements is lazy; the engine consumes it to
/// completion before moving to the next record (spec §9).
#[derive(Debug, Clone)]
pub struct Record {
    pub status: RecordStatus,
    pub dump_type: DumpType,
    pub dump_pos: DumpPos,
    /// Identity of the dump this record belongs to (opaque to the engine
    /// beyond equality — used to detect interleaved dumps, spec §4.F.1).
    pub dump_time: u32,
    /// Timestamp of this specific record within the dump/stream.
    pub record_time: u32,
    pub dump_project: String,
    pub dump_collector: String,
    pub elements: Vec<RecordElement>,
}

/// The kind of observation one element carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Rib,
    Announcement,
    Withdrawal,
    PeerState,
}

/// One element within a record: an RIB row, an update (announcement or
/// withdrawal), or a peer FSM transition.
#[derive(Debug, Clone)]
pub struct RecordElement {
    pub kind: ElementKind,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    /// Present for `Rib`, `Announcement`, `Withdrawal`.
    pub prefix: Option<IpNet>,
    /// Present for `Rib`, `Announcement`.
    pub as_path: Option<Vec<AsSegment>>,
    /// Present for `PeerState`.
    pub new_state: Option<FsmState>,
}

impl RecordElement {
    pub fn rib(peer_ip: IpAddr, peer_asn: u32, prefix: IpNet, as_path: Vec<AsSegment>) -> Self {
        Self {
            kind: ElementKind::Rib,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            as_path: Some(as_path),
            new_state: None,
        }
    }

    pub fn announcement(
        peer_ip: IpAddr,
        peer_asn: u32,
        prefix: IpNet,
        as_path: Vec<AsSegment>,
    ) -> Self {
        Self {
            kind: ElementKind::Announcement,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            as_path: Some(as_path),
            new_state: None,
        }
    }

    pub fn withdrawal(peer_ip: IpAddr, peer_asn: u32, prefix: IpNet) -> Self {
        Self {
            kind: ElementKind::Withdrawal,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            as_path: None,
            new_state: None,
        }
    }

    pub fn peer_state(peer_ip: IpAddr, peer_asn: u32, new_state: FsmState) -> Self {
        Self {
            kind: ElementKind::PeerState,
            peer_ip,
            peer_asn,
            prefix: None,
            as_path: None,
            new_state: Some(new_state),
        }
    }
}

/// The record source boundary the engine drives from its own thread
/// (spec §5, §6). A producer wanting acquisition on another thread hands
/// records across a `std::sync::mpsc` bounded channel and implements this
/// trait on the receiving end.
pub trait RecordSource {
    fn next_record(&mut self) -> Option<Record>;
}
