//! The RIB reconciler (spec §4.F): starts/restarts under-construction RIBs
//! and, at RIB end, reconciles UC data into live state using the backlog
//! rule.

use crate::collector::CollectorState;
use crate::config::EngineConfig;
use crate::folder::abort_uc_for_peer;
use crate::origin::Origin;
use crate::peer_registry::PeerId;
use crate::view::{FsmState, View};

/// §4.F.1: a RIB Start record for collector `C`. If a prior UC was never
/// finalized, it is stopped first.
pub fn rib_start(view: &mut View, collector: &mut CollectorState, dump_time: u32, record_time: u32) {
    if collector.has_uc() {
        stop_uc(view, collector);
    }
    collector.uc_rib_dump_time = dump_time;
    collector.uc_rib_start_time = record_time;
}

/// §4.F.5: clears every cell's UC fields for every peer of `C` (wiping
/// live too for peers that are currently Inactive), then clears every
/// peer's and the collector's UC window.
pub fn stop_uc(view: &mut View, collector: &mut CollectorState) {
    let peers: Vec<PeerId> = collector.peers().collect();
    for peer in peers {
        let peer_active = view.peer(peer).is_active();
        for (_, cell) in view.cells_for_peer_mut(peer) {
            cell.wipe_uc();
            if !peer_active {
                cell.wipe_live();
            }
        }
        let p = view.peer_mut(peer);
        p.uc_rib_start_ts = 0;
        p.uc_rib_end_ts = 0;
    }
    collector.uc_rib_dump_time = 0;
    collector.uc_rib_start_time = 0;
}

/// §4.F.2: RIB End — promotes UC over live per cell using the backlog
/// predicate, then sweeps inactive never-RIB'd peers and promotes the
/// collector's UC identity to its reference RIB.
pub fn rib_end(view: &mut View, collector: &mut CollectorState, cfg: &EngineConfig) {
    let peers: Vec<PeerId> = collector.peers().collect();

    for peer in &peers {
        let peer = *peer;
        let uc_rib_start_ts = view.peer(peer).uc_rib_start_ts;
        if uc_rib_start_ts == 0 {
            maybe_sweep_inactive_peer(view, collector, peer, cfg.inactive_timeout_secs);
            continue;
        }
        let uc_rib_end_ts = view.peer(peer).uc_rib_end_ts;

        let keys = view.prefix_keys_for_peer(peer);
        for key in keys {
            let (uc_delta_ts, uc_origin, live_last_ts, live_origin, live_active) = {
                let cell = view.cell(peer, key).expect("from prefix_keys_for_peer");
                (
                    cell.uc_delta_ts,
                    cell.uc_origin_asn,
                    cell.last_ts,
                    cell.origin_asn,
                    cell.is_active(),
                )
            };
            // A cell with no UC row of its own still gets an implicit
            // timestamp at the peer's UC RIB start — a prefix missing
            // from a full dump is information too (it means withdrawn).
            // Only a peer with no UC at all (`uc_rib_start_ts == 0`,
            // filtered out by the caller above) collapses this to zero.
            let uc_ts = uc_delta_ts + uc_rib_start_ts;

            let backlog_floor = uc_rib_start_ts.saturating_sub(cfg.backlog_window_secs);
            let predicate_holds = uc_ts > live_last_ts && !(live_last_ts > backlog_floor);

            if predicate_holds {
                if uc_origin != Origin::Down {
                    // negative mismatch: live lacked a route the RIB has.
                    if !live_active {
                        view.peer_mut(peer).negative_mismatch_count += 1;
                    }
                    {
                        let cell = view.cell_mut(peer, key).expect("from prefix_keys_for_peer");
                        cell.last_ts = uc_ts;
                        cell.origin_asn = uc_origin;
                    }
                    view.activate_cell(peer, key);
                    view.activate_peer(peer);
                    let p = view.peer_mut(peer);
                    p.fsm_state = FsmState::Established;
                    p.ref_rib_start_ts = uc_rib_start_ts;
                    p.ref_rib_end_ts = uc_rib_end_ts;
                } else {
                    // positive mismatch: live had a route the RIB lacks.
                    if live_active {
                        view.peer_mut(peer).positive_mismatch_count += 1;
                    }
                    {
                        let cell = view.cell_mut(peer, key).expect("from prefix_keys_for_peer");
                        cell.last_ts = 0;
                        cell.origin_asn = Origin::Down;
                    }
                    view.deactivate_cell(peer, key);
                }
            } else if live_origin.is_route() {
                view.activate_cell(peer, key);
                view.activate_peer(peer);
                let p = view.peer_mut(peer);
                p.fsm_state = FsmState::Established;
                p.ref_rib_start_ts = uc_rib_start_ts;
                p.ref_rib_end_ts = uc_rib_end_ts;
            }
        }
    }

    // every peer's UC window is cleared once reconciliation has run,
    // whether or not it received any RIB rows this round.
    for peer in &peers {
        abort_uc_for_peer(view, *peer);
    }

    collector.ref_rib_dump_time = collector.uc_rib_dump_time;
    collector.ref_rib_start_time = collector.uc_rib_start_time;
    collector.uc_rib_dump_time = 0;
    collector.uc_rib_start_time = 0;
}

fn maybe_sweep_inactive_peer(
    view: &mut View,
    collector: &CollectorState,
    peer: PeerId,
    inactive_timeout_secs: u32,
) {
    let p = view.peer(peer);
    if p.fsm_state != FsmState::Established {
        return;
    }
    let floor = collector.bgp_time_last.saturating_sub(inactive_timeout_secs);
    if p.last_ts >= floor {
        return;
    }
    for (_, cell) in view.cells_for_peer_mut(peer) {
        cell.wipe_live();
    }
    let p = view.peer_mut(peer);
    p.fsm_state = FsmState::Unknown;
    p.ref_rib_start_ts = 0;
    p.ref_rib_end_ts = 0;
    view.deactivate_peer(peer);
}

/// §4.F.3: a corrupted record for `C` at `ts`. Resets live state for any
/// peer whose reference RIB predates `ts`, and UC state for any peer
/// whose UC RIB predates `ts`; both may apply to the same peer.
pub fn corrupted_record(view: &mut View, collector: &mut CollectorState, ts: u32) {
    collector.corrupted_record_count += 1;
    let peers: Vec<PeerId> = collector.peers().collect();
    for peer in peers {
        let (ref_rib_start_ts, uc_rib_start_ts) = {
            let p = view.peer(peer);
            (p.ref_rib_start_ts, p.uc_rib_start_ts)
        };

        if ref_rib_start_ts != 0 && ts >= ref_rib_start_ts {
            for (_, cell) in view.cells_for_peer_mut(peer) {
                cell.wipe_live();
            }
            view.deactivate_peer(peer);
            let p = view.peer_mut(peer);
            p.fsm_state = FsmState::Unknown;
            p.ref_rib_start_ts = 0;
            p.ref_rib_end_ts = 0;
        }

        if uc_rib_start_ts != 0 && ts >= uc_rib_start_ts {
            abort_uc_for_peer(view, peer);
        }
    }
}

/// §4.F.4: an empty/filtered record does not change folded state, it only
/// advances `bgp_time_last` — unconditionally, not monotonically. This
/// mirrors a quirk in the original behavior rather than "fixing" it; see
/// the open question recorded in DESIGN.md.
pub fn empty_or_filtered_record(collector: &mut CollectorState, ts: u32) {
    collector.empty_record_count += 1;
    collector.bgp_time_last = ts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::apply_rib_row;
    use crate::origin::AsSegment;
    use crate::peer_registry::{PeerRegistry, PeerSignature};
    use ipnet::IpNet;

    fn sig(asn: u32) -> PeerSignature {
        PeerSignature {
            peer_ip: "192.0.2.1".parse().unwrap(),
            peer_asn: asn,
        }
    }

    #[test]
    fn s2_backlog_predicate_fails_live_wins() {
        let mut view = View::new();
        let mut registry = PeerRegistry::new();
        let mut collector = CollectorState::new("rrc00");
        let cfg = EngineConfig::default();
        let p = sig(65002);
        let net: IpNet = "1.1.0.0/16".parse().unwrap();

        crate::folder::apply_peer_state(&mut view, &mut registry, &mut collector, p, FsmState::Established, 900);
        crate::folder::apply_update(
            &mut view, &mut registry, &mut collector, p, net,
            Some(&[AsSegment::Num(65002)]), true, 1000,
        );

        rib_start(&mut view, &mut collector, 1050, 1050);
        apply_rib_row(&mut view, &mut registry, &mut collector, p, net, &[AsSegment::Num(65999)], 1050);
        collector.bgp_time_last = 1055;
        rib_end(&mut view, &mut collector, &cfg);

        let peer_id = registry.get(&p).unwrap();
        let key = view.get_or_create_prefix(net);
        let cell = view.cell(peer_id, key).unwrap();
        assert_eq!(cell.origin_asn, Origin::Real(65002));
        assert_eq!(cell.last_ts, 1000);
        assert!(view.peer(peer_id).is_active());
    }

    #[test]
    fn s3_backlog_predicate_holds_missed_withdrawal() {
        let mut view = View::new();
        let mut registry = PeerRegistry::new();
        let mut collector = CollectorState::new("rrc00");
        let cfg = EngineConfig::default();
        let p = sig(65003);
        let net: IpNet = "2.2.0.0/16".parse().unwrap();

        crate::folder::apply_peer_state(&mut view, &mut registry, &mut collector, p, FsmState::Established, 900);
        crate::folder::apply_update(
            &mut view, &mut registry, &mut collector, p, net,
            Some(&[AsSegment::Num(65003)]), true, 1000,
        );

        rib_start(&mut view, &mut collector, 2000, 2000);
        // RIB rows for p do not mention 2.2.0.0/16 — simulate via an
        // unrelated prefix so uc_rib_start_ts(p) becomes nonzero.
        let other: IpNet = "9.9.0.0/16".parse().unwrap();
        apply_rib_row(&mut view, &mut registry, &mut collector, p, other, &[AsSegment::Num(65003)], 2005);
        collector.bgp_time_last = 2010;
        rib_end(&mut view, &mut collector, &cfg);

        let peer_id = registry.get(&p).unwrap();
        let key = view.get_or_create_prefix(net);
        let cell = view.cell(peer_id, key).unwrap();
        assert!(!cell.is_active());
        assert_eq!(cell.origin_asn, Origin::Down);
        assert_eq!(cell.last_ts, 0);
        assert_eq!(view.peer(peer_id).positive_mismatch_count, 1);
    }

    #[test]
    fn stop_uc_clears_cell_and_peer_uc_fields() {
        let mut view = View::new();
        let mut registry = PeerRegistry::new();
        let mut collector = CollectorState::new("rrc00");
        let p = sig(65004);
        let net: IpNet = "3.3.0.0/16".parse().unwrap();

        rib_start(&mut view, &mut collector, 100, 100);
        apply_rib_row(&mut view, &mut registry, &mut collector, p, net, &[AsSegment::Num(65004)], 105);
        stop_uc(&mut view, &mut collector);

        let peer_id = registry.get(&p).unwrap();
        let key = view.get_or_create_prefix(net);
        assert_eq!(view.peer(peer_id).uc_rib_start_ts, 0);
        assert_eq!(view.cell(peer_id, key).unwrap().uc_delta_ts, 0);
        assert_eq!(collector.uc_rib_dump_time, 0);
    }

    #[test]
    fn corrupted_record_resets_live_and_uc_independently() {
        let mut view = View::new();
        let mut registry = PeerRegistry::new();
        let mut collector = CollectorState::new("rrc00");
        let p1 = sig(1);
        let p2 = sig(2);

        crate::folder::apply_peer_state(&mut view, &mut registry, &mut collector, p1, FsmState::Established, 100);
        rib_start(&mut view, &mut collector, 900, 900);
        apply_rib_row(
            &mut view, &mut registry, &mut collector, p1,
            "10.0.0.0/24".parse().unwrap(), &[AsSegment::Num(1)], 905,
        );
        apply_rib_row(
            &mut view, &mut registry, &mut collector, p2,
            "10.0.1.0/24".parse().unwrap(), &[AsSegment::Num(2)], 905,
        );

        corrupted_record(&mut view, &mut collector, 910);

        let id1 = registry.get(&p1).unwrap();
        let id2 = registry.get(&p2).unwrap();
        assert_eq!(view.peer(id1).fsm_state, FsmState::Unknown);
        assert_eq!(view.peer(id1).uc_rib_start_ts, 0);
        assert_eq!(view.peer(id2).uc_rib_start_ts, 0);
        assert_eq!(collector.corrupted_record_count, 1);
    }
}
