//! Per-collector bookkeeping (spec §3 "Per-collector record", §4.D).

use std::collections::HashSet;

use time::OffsetDateTime;

use crate::peer_registry::PeerId;

/// Collector-wide liveness, derived from its peers' FSM states (invariant
/// I5): `Up` iff at least one peer is Active; `Down` if none are active
/// but at least one has ever left `Unknown`; `Unknown` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectorStatus {
    Unknown,
    Down,
    Up,
}

impl std::fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectorStatus::Unknown => "unknown",
            CollectorStatus::Down => "down",
            CollectorStatus::Up => "up",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for one collector: its known peers, the identity of the
/// reference and under-construction RIBs, and record counters.
#[derive(Debug, Clone)]
pub struct CollectorState {
    pub name: String,
    peers: HashSet<PeerId>,

    pub bgp_time_last: u32,

    pub ref_rib_dump_time: u32,
    pub ref_rib_start_time: u32,

    pub uc_rib_dump_time: u32,
    pub uc_rib_start_time: u32,

    pub status: CollectorStatus,

    pub valid_record_count: u64,
    pub corrupted_record_count: u64,
    pub empty_record_count: u64,
    pub protocol_error_count: u64,

    /// Wall-clock time as of the last refresh (reporting only, spec §4.D).
    pub wall_time_last: Option<OffsetDateTime>,
    wall_refresh_floor: u32,
}

impl CollectorState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peers: HashSet::new(),
            bgp_time_last: 0,
            ref_rib_dump_time: 0,
            ref_rib_start_time: 0,
            uc_rib_dump_time: 0,
            uc_rib_start_time: 0,
            status: CollectorStatus::Unknown,
            valid_record_count: 0,
            corrupted_record_count: 0,
            empty_record_count: 0,
            protocol_error_count: 0,
            wall_time_last: None,
            wall_refresh_floor: 0,
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().copied()
    }

    pub fn add_peer(&mut self, id: PeerId) {
        self.peers.insert(id);
    }

    pub fn has_uc(&self) -> bool {
        self.uc_rib_dump_time != 0
    }

    /// Records a new max timestamp seen for this collector and, if at
    /// least `wall_update_period_secs` of BGP time has passed since the
    /// last refresh, stamps `wall_time_last` for operator reporting. Wall
    /// time never participates in folding/reconciliation decisions.
    pub fn advance_bgp_time(&mut self, ts: u32, wall_update_period_secs: u32) {
        if ts > self.bgp_time_last {
            self.bgp_time_last = ts;
        }
        if self.wall_time_last.is_none()
            || self.bgp_time_last.saturating_sub(self.wall_refresh_floor) >= wall_update_period_secs
        {
            self.wall_time_last = Some(OffsetDateTime::now_utc());
            self.wall_refresh_floor = self.bgp_time_last;
        }
    }

    /// Recomputes [`CollectorStatus`] per invariant I5. Must be called
    /// after any change to a member peer's `fsm_state`.
    pub fn recompute_status(&mut self, any_active: bool, any_left_unknown: bool) {
        self.status = if any_active {
            CollectorStatus::Up
        } else if any_left_unknown {
            CollectorStatus::Down
        } else {
            CollectorStatus::Unknown
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_bgp_time_is_monotonic_floor() {
        let mut c = CollectorState::new("test-collector");
        c.advance_bgp_time(100, 60);
        c.advance_bgp_time(50, 60);
        assert_eq!(c.bgp_time_last, 100);
    }

    #[test]
    fn status_transitions() {
        let mut c = CollectorState::new("test-collector");
        c.recompute_status(false, false);
        assert_eq!(c.status, CollectorStatus::Unknown);
        c.recompute_status(false, true);
        assert_eq!(c.status, CollectorStatus::Down);
        c.recompute_status(true, true);
        assert_eq!(c.status, CollectorStatus::Up);
    }

    #[test]
    fn wall_time_refreshes_after_period() {
        let mut c = CollectorState::new("test-collector");
        c.advance_bgp_time(1000, 60);
        let first = c.wall_time_last;
        assert!(first.is_some());
        c.advance_bgp_time(1010, 60);
        assert_eq!(c.wall_time_last, first);
        c.advance_bgp_time(1065, 60);
        assert!(c.wall_time_last.unwrap() >= first.unwrap());
        assert_eq!(c.wall_refresh_floor, 1065);
    }
}
