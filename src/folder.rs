//! The update folder — applies one element to the view (spec §4.E). This
//! is the central algorithm: everything else exists to feed it elements
//! in the right order and to reconcile its under-construction output.

use ipnet::IpNet;

use crate::collector::CollectorState;
use crate::origin::{extract_origin, AsSegment, Origin};
use crate::peer_registry::{PeerRegistry, PeerSignature};
use crate::view::{FsmState, View};

/// §4.E.2: reject RIB rows and announcements whose first path segment is
/// a single ASN other than the peer's own (route-server artifacts), and
/// any element with an empty path.
fn passes_peer_path_sanity(as_path: &[AsSegment], peer_asn: u32) -> bool {
    match as_path.first() {
        None => false,
        Some(AsSegment::Num(first)) => *first == peer_asn,
        Some(AsSegment::Set(_)) => true,
    }
}

/// §4.E.3: applies an announcement or withdrawal for `sig` at `ts`.
pub fn apply_update(
    view: &mut View,
    registry: &mut PeerRegistry,
    collector: &mut CollectorState,
    sig: PeerSignature,
    prefix: IpNet,
    as_path: Option<&[AsSegment]>,
    is_announcement: bool,
    ts: u32,
) {
    if is_announcement {
        let Some(path) = as_path else { return };
        if !passes_peer_path_sanity(path, sig.peer_asn) {
            return;
        }
    }

    let peer_id = registry.get_or_insert(sig);
    view.ensure_peer(peer_id, sig);
    collector.add_peer(peer_id);

    let origin = if is_announcement {
        extract_origin(as_path.expect("checked above"))
    } else {
        Origin::Down
    };

    let key = view.ensure_cell(prefix, peer_id);

    // 1. peer counters, regardless of the out-of-order gate below.
    {
        let p = view.peer_mut(peer_id);
        p.update_count += 1;
        if ts > p.last_ts {
            p.last_ts = ts;
        }
        if is_announcement {
            p.announcing_asns.insert(origin.to_wire());
            p.announced_prefixes.insert(key);
        } else {
            p.withdrawn_prefixes.insert(key);
        }
    }

    // 2. out-of-order suppression.
    let prior_last_ts = view.cell(peer_id, key).expect("just ensured").last_ts;
    if ts < prior_last_ts {
        return;
    }

    // 3. commit the cell update.
    {
        let cell = view.cell_mut(peer_id, key).expect("just ensured");
        cell.last_ts = ts;
        cell.origin_asn = origin;
        if is_announcement {
            cell.announce_count += 1;
        } else {
            cell.withdraw_count += 1;
        }
    }

    // 4. transition matrix.
    if view.peer(peer_id).is_active() {
        let cell_active = view.cell(peer_id, key).expect("just ensured").is_active();
        if is_announcement && !cell_active {
            view.activate_cell(peer_id, key);
        } else if !is_announcement && cell_active {
            view.deactivate_cell(peer_id, key);
        }
        return;
    }

    if view.peer(peer_id).fsm_state == FsmState::Unknown {
        if view.peer(peer_id).uc_rib_start_ts != 0 {
            // keep the cell update for later reconciliation.
            return;
        }
        // revert: this peer has never seen any RIB context at all.
        let cell = view.cell_mut(peer_id, key).expect("just ensured");
        cell.last_ts = 0;
        cell.origin_asn = Origin::Down;
        if is_announcement {
            cell.announce_count -= 1;
        } else {
            cell.withdraw_count -= 1;
        }
        return;
    }

    // peer inactive, fsm known (e.g. Idle/Connect/...): promote to Active.
    {
        let p = view.peer_mut(peer_id);
        p.fsm_state = FsmState::Established;
        p.ref_rib_start_ts = ts;
        p.ref_rib_end_ts = ts;
    }
    view.activate_peer(peer_id);
    if is_announcement {
        view.activate_cell(peer_id, key);
    }
}

/// §4.E.4: applies a peer FSM transition for `sig` at `ts`.
pub fn apply_peer_state(
    view: &mut View,
    registry: &mut PeerRegistry,
    collector: &mut CollectorState,
    sig: PeerSignature,
    new_state: FsmState,
    ts: u32,
) {
    let peer_id = registry.get_or_insert(sig);
    view.ensure_peer(peer_id, sig);
    collector.add_peer(peer_id);

    let prior = view.peer(peer_id).fsm_state;
    view.peer_mut(peer_id).state_msg_count += 1;

    let was_established = prior == FsmState::Established;
    let becomes_established = new_state == FsmState::Established;

    if was_established && !becomes_established {
        let uc_rib_start_ts = view.peer(peer_id).uc_rib_start_ts;
        {
            let p = view.peer_mut(peer_id);
            p.fsm_state = new_state;
            p.ref_rib_start_ts = ts;
            p.ref_rib_end_ts = ts;
        }
        if uc_rib_start_ts != 0 && ts >= uc_rib_start_ts {
            abort_uc_for_peer(view, peer_id);
        }
        for (_, cell) in view.cells_for_peer_mut(peer_id) {
            cell.wipe_live();
        }
        view.deactivate_peer(peer_id);
    } else if !was_established && becomes_established {
        view.activate_peer(peer_id);
        let p = view.peer_mut(peer_id);
        p.fsm_state = new_state;
        p.ref_rib_start_ts = ts;
        p.ref_rib_end_ts = ts;
        // cells remain as they were.
    } else {
        let p = view.peer_mut(peer_id);
        p.fsm_state = new_state;
        p.ref_rib_start_ts = ts;
        p.ref_rib_end_ts = ts;
    }
}

/// §4.E.5: applies one RIB row for `sig` at `ts` into the peer's UC state.
pub fn apply_rib_row(
    view: &mut View,
    registry: &mut PeerRegistry,
    collector: &mut CollectorState,
    sig: PeerSignature,
    prefix: IpNet,
    as_path: &[AsSegment],
    ts: u32,
) {
    if !passes_peer_path_sanity(as_path, sig.peer_asn) {
        return;
    }

    let peer_id = registry.get_or_insert(sig);
    view.ensure_peer(peer_id, sig);
    collector.add_peer(peer_id);

    let origin = extract_origin(as_path);

    let uc_rib_start_ts = {
        let p = view.peer_mut(peer_id);
        if p.uc_rib_start_ts == 0 {
            p.uc_rib_start_ts = ts;
        }
        p.uc_rib_end_ts = ts;
        p.rib_row_count += 1;
        p.uc_rib_start_ts
    };

    let key = view.ensure_cell(prefix, peer_id);
    let cell = view.cell_mut(peer_id, key).expect("just ensured");
    cell.uc_delta_ts = ts.saturating_sub(uc_rib_start_ts);
    cell.uc_origin_asn = origin;
}

/// Clears a peer's UC window and every one of its cells' UC fields,
/// without touching live fields. Shared by the peer-down abort path
/// (§4.E.4) and by the reconciler's stop-UC (§4.F.5).
pub(crate) fn abort_uc_for_peer(view: &mut View, peer_id: crate::peer_registry::PeerId) {
    for (_, cell) in view.cells_for_peer_mut(peer_id) {
        cell.wipe_uc();
    }
    let p = view.peer_mut(peer_id);
    p.uc_rib_start_ts = 0;
    p.uc_rib_end_ts = 0;
}
