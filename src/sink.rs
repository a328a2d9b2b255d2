//! External sink traits the engine produces into (spec §6): a view sink
//! for completed views and a metrics sink for named scalar series.

use ipnet::IpNet;

use crate::origin::Origin;
use crate::peer_registry::PeerSignature;
use crate::view::FsmState;

/// Sanitizes one metric path segment the way graphite wants it: dots and
/// asterisks both collapse to `-` (spec §9(c) unifies the two divergent
/// behaviors the source had).
pub fn graphite_safe(segment: &str) -> String {
    segment.replace(['.', '*'], "-")
}

/// Builds a full graphite-style series name from already-safe segments,
/// joined with `.` (spec §6: `<prefix>.<collector>.<peer>.<metric>`).
pub fn metric_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| graphite_safe(s))
        .collect::<Vec<_>>()
        .join(".")
}

/// A read-only view of one peer, as exposed to a [`ViewSink`].
#[derive(Debug, Clone)]
pub struct PeerView {
    pub signature: PeerSignature,
    pub fsm_state: FsmState,
    pub is_active: bool,
    pub ref_rib_start_ts: u32,
    pub ref_rib_end_ts: u32,
    pub last_ts: u32,
    pub v4_active_count: usize,
    pub v6_active_count: usize,
}

/// A read-only view of one (prefix, peer) cell, as exposed to a
/// [`ViewSink`].
#[derive(Debug, Clone)]
pub struct CellView {
    pub prefix: IpNet,
    pub peer: PeerSignature,
    pub origin_asn: Origin,
    pub is_active: bool,
}

/// An owned, point-in-time copy of a collector's view, handed to the sink
/// at interval end so the engine is free to keep mutating the next
/// generation underneath it (the "serialize-then-continue" discipline,
/// spec §5).
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub collector: String,
    pub view_time: u32,
    pub peers: Vec<PeerView>,
    pub cells: Vec<CellView>,
}

/// Accepts completed views. Delivery is best-effort: implementations may
/// run asynchronously on their own thread; failures are surfaced to the
/// engine as non-fatal [`crate::error::EngineError::Sink`] warnings.
pub trait ViewSink {
    fn publish(&mut self, view: &ViewSnapshot, accept_peer: &dyn Fn(&PeerView) -> bool);
}

/// Accepts named scalar time-series points.
pub trait MetricsSink {
    fn emit(&mut self, series: &str, value: f64);
}

/// A [`Family`]-aware filter helper: accepts a [`Family`] and threshold pair
/// used by the full-feed predicate (spec §4.G).
pub fn is_full_feed(peer: &PeerView, v4_threshold: u32, v6_threshold: u32) -> bool {
    peer.v4_active_count as u32 >= v4_threshold || peer.v6_active_count as u32 >= v6_threshold
}
