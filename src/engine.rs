//! The top-level `Engine`: wires the prefix index, peer registry, view,
//! collector state, update folder, and RIB reconciler together, driven by
//! [`Engine::ingest_record`], and wraps ingest in publication intervals
//! (spec §4.G).

use std::collections::HashMap;

use crate::collector::{CollectorState, CollectorStatus};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::folder;
use crate::peer_registry::{PeerRegistry, PeerSignature};
use crate::reconcile;
use crate::record::{DumpPos, DumpType, ElementKind, Record, RecordElement, RecordStatus};
use crate::sink::{is_full_feed, metric_path, CellView, MetricsSink, PeerView, ViewSink, ViewSnapshot};
use crate::view::{Family, FsmState, View};

struct Collector {
    state: CollectorState,
    registry: PeerRegistry,
    view: View,
}

impl Collector {
    fn new(name: &str) -> Self {
        Self {
            state: CollectorState::new(name),
            registry: PeerRegistry::new(),
            view: View::new(),
        }
    }
}

/// A read-only snapshot of one collector's counters, for operator tooling
/// (no new state — assembled from the counters §3/§4.D/§4.E already
/// require the engine to maintain).
#[derive(Debug, Clone)]
pub struct CollectorStats {
    pub name: String,
    pub status: CollectorStatus,
    pub peer_count: usize,
    pub active_peer_count: usize,
    pub valid_record_count: u64,
    pub corrupted_record_count: u64,
    pub empty_record_count: u64,
    pub protocol_error_count: u64,
}

/// The routing-tables engine. Owned exclusively by its driver: no hidden
/// singletons, single value passed by `&mut` (spec §9).
pub struct Engine {
    cfg: EngineConfig,
    collectors: HashMap<String, Collector>,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            collectors: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// §4.G: sets the nominal start of the next publication interval on
    /// every collector's view.
    pub fn interval_start(&mut self, t_start: u32) {
        for collector in self.collectors.values_mut() {
            collector.view.view_time = t_start;
        }
    }

    /// §4.G: hands every collector's view to `sink` behind the full-feed
    /// predicate built from the configured thresholds, then emits metrics.
    pub fn interval_end(&self, sink: &mut dyn ViewSink, metrics: &mut dyn MetricsSink) {
        let v4_threshold = self.cfg.v4_fullfeed_threshold;
        let v6_threshold = self.cfg.v6_fullfeed_threshold;
        for (name, collector) in self.collectors.iter() {
            let snapshot = build_snapshot(name, collector);
            let accept = |p: &PeerView| is_full_feed(p, v4_threshold, v6_threshold);
            sink.publish(&snapshot, &accept);
            if self.cfg.metrics_enabled {
                emit_metrics(&self.cfg, name, collector, metrics);
            }
        }
    }

    /// Folds one record into the relevant collector's view. Only a
    /// resource-exhaustion condition is returned as `Err`; every other
    /// non-fatal error kind is logged and counted per §7.
    pub fn ingest_record(&mut self, record: Record) -> Result<(), EngineError> {
        let collector = self
            .collectors
            .entry(record.dump_collector.clone())
            .or_insert_with(|| Collector::new(&record.dump_collector));

        match record.status {
            RecordStatus::Valid => {}
            RecordStatus::CorruptedRecord => {
                reconcile::corrupted_record(&mut collector.view, &mut collector.state, record.record_time);
                return Ok(());
            }
            RecordStatus::CorruptedSource => {
                collector.state.corrupted_record_count += 1;
                return Ok(());
            }
            RecordStatus::FilteredSource | RecordStatus::EmptySource => {
                reconcile::empty_or_filtered_record(&mut collector.state, record.record_time);
                return Ok(());
            }
        }

        if collector.registry.len() >= u32::MAX as usize {
            return Err(EngineError::ResourceExhausted(format!(
                "collector {} exceeded the maximum representable peer count",
                record.dump_collector
            )));
        }

        collector
            .state
            .advance_bgp_time(record.record_time, self.cfg.wall_update_period_secs);
        collector.state.valid_record_count += 1;

        if record.dump_type == DumpType::Rib {
            if record.dump_pos == DumpPos::Start {
                reconcile::rib_start(
                    &mut collector.view,
                    &mut collector.state,
                    record.dump_time,
                    record.record_time,
                );
            }

            // rows from an interleaved, different dump are ignored (§4.F.1).
            if record.dump_time == collector.state.uc_rib_dump_time {
                fold_elements(collector, &record.elements, record.record_time);
            } else {
                tracing::debug!(
                    collector = %record.dump_collector,
                    record_dump_time = record.dump_time,
                    "ignoring RIB row(s) from a non-current dump"
                );
            }

            if record.dump_pos == DumpPos::End {
                reconcile::rib_end(&mut collector.view, &mut collector.state, &self.cfg);
            }
        } else {
            fold_elements(collector, &record.elements, record.record_time);
        }

        recompute_status(collector);
        Ok(())
    }

    /// Completes the current record stream. `discard_pending` drops the
    /// in-progress generation instead of publishing it one last time.
    pub fn shutdown(
        &mut self,
        discard_pending: bool,
        sink: Option<(&mut dyn ViewSink, &mut dyn MetricsSink)>,
    ) {
        if discard_pending {
            return;
        }
        if let Some((sink, metrics)) = sink {
            self.interval_end(sink, metrics);
        }
    }

    pub fn stats(&self) -> Vec<CollectorStats> {
        self.collectors
            .iter()
            .map(|(name, c)| CollectorStats {
                name: name.clone(),
                status: c.state.status,
                peer_count: c.registry.len(),
                active_peer_count: c
                    .view
                    .iter_peer_ids()
                    .filter(|&id| c.view.peer(id).is_active())
                    .count(),
                valid_record_count: c.state.valid_record_count,
                corrupted_record_count: c.state.corrupted_record_count,
                empty_record_count: c.state.empty_record_count,
                protocol_error_count: c.state.protocol_error_count,
            })
            .collect()
    }
}

fn fold_elements(collector: &mut Collector, elements: &[RecordElement], ts: u32) {
    for elem in elements {
        if let Err(e) = fold_element(collector, elem, ts) {
            collector.state.protocol_error_count += 1;
            tracing::warn!(peer_ip = %elem.peer_ip, error = %e, "protocol error folding element");
        }
    }
}

fn fold_element(collector: &mut Collector, elem: &RecordElement, ts: u32) -> Result<(), EngineError> {
    let sig = PeerSignature {
        peer_ip: elem.peer_ip,
        peer_asn: elem.peer_asn,
    };

    match elem.kind {
        ElementKind::Rib => {
            let prefix = require(elem.prefix, elem, "RIB row missing prefix")?;
            let path = require(elem.as_path.as_deref(), elem, "RIB row missing as-path")?;
            folder::apply_rib_row(
                &mut collector.view,
                &mut collector.registry,
                &mut collector.state,
                sig,
                prefix,
                path,
                ts,
            );
        }
        ElementKind::Announcement => {
            let prefix = require(elem.prefix, elem, "announcement missing prefix")?;
            let path = require(elem.as_path.as_deref(), elem, "announcement missing as-path")?;
            folder::apply_update(
                &mut collector.view,
                &mut collector.registry,
                &mut collector.state,
                sig,
                prefix,
                Some(path),
                true,
                ts,
            );
        }
        ElementKind::Withdrawal => {
            let prefix = require(elem.prefix, elem, "withdrawal missing prefix")?;
            folder::apply_update(
                &mut collector.view,
                &mut collector.registry,
                &mut collector.state,
                sig,
                prefix,
                None,
                false,
                ts,
            );
        }
        ElementKind::PeerState => {
            let new_state = require(elem.new_state, elem, "peer-state element missing new_state")?;
            folder::apply_peer_state(
                &mut collector.view,
                &mut collector.registry,
                &mut collector.state,
                sig,
                new_state,
                ts,
            );
        }
    }
    Ok(())
}

fn require<T>(value: Option<T>, elem: &RecordElement, reason: &str) -> Result<T, EngineError> {
    value.ok_or_else(|| EngineError::Protocol {
        peer_ip: elem.peer_ip,
        reason: reason.to_string(),
    })
}

/// Recomputes collector status (invariant I5) after any change to a
/// member peer's `fsm_state` — must run after every record (spec §4.D).
fn recompute_status(collector: &mut Collector) {
    let mut any_active = false;
    let mut any_left_unknown = false;
    for peer_id in collector.view.iter_peer_ids() {
        let p = collector.view.peer(peer_id);
        if p.is_active() {
            any_active = true;
        }
        if p.fsm_state != FsmState::Unknown {
            any_left_unknown = true;
        }
    }
    collector.state.recompute_status(any_active, any_left_unknown);
}

fn build_snapshot(name: &str, collector: &Collector) -> ViewSnapshot {
    let view = &collector.view;
    let mut peers = Vec::new();
    let mut cells = Vec::new();
    for peer_id in view.iter_peer_ids() {
        let p = view.peer(peer_id);
        peers.push(PeerView {
            signature: p.signature,
            fsm_state: p.fsm_state,
            is_active: p.is_active(),
            ref_rib_start_ts: p.ref_rib_start_ts,
            ref_rib_end_ts: p.ref_rib_end_ts,
            last_ts: p.last_ts,
            v4_active_count: view.active_cell_count(peer_id, Family::V4),
            v6_active_count: view.active_cell_count(peer_id, Family::V6),
        });
        for (key, cell) in view.cells_for_peer(peer_id) {
            cells.push(CellView {
                prefix: view.prefix_net(key),
                peer: p.signature,
                origin_asn: cell.origin_asn,
                is_active: cell.is_active(),
            });
        }
    }
    ViewSnapshot {
        collector: name.to_string(),
        view_time: view.view_time,
        peers,
        cells,
    }
}

fn fsm_metric_value(state: FsmState) -> f64 {
    match state {
        FsmState::Unknown => 0.0,
        FsmState::Idle => 1.0,
        FsmState::Connect => 2.0,
        FsmState::Active => 3.0,
        FsmState::OpenSent => 4.0,
        FsmState::OpenConfirm => 5.0,
        FsmState::Established => 6.0,
    }
}

fn emit_metrics(cfg: &EngineConfig, name: &str, collector: &Collector, metrics: &mut dyn MetricsSink) {
    let prefix = cfg.metric_prefix.as_str();
    let view = &collector.view;

    let active_peers = view
        .iter_peer_ids()
        .filter(|&id| view.peer(id).is_active())
        .count();
    metrics.emit(&metric_path(&[prefix, name, "active_peers"]), active_peers as f64);
    metrics.emit(
        &metric_path(&[prefix, name, "valid_records"]),
        collector.state.valid_record_count as f64,
    );
    metrics.emit(
        &metric_path(&[prefix, name, "corrupted_records"]),
        collector.state.corrupted_record_count as f64,
    );
    metrics.emit(
        &metric_path(&[prefix, name, "empty_records"]),
        collector.state.empty_record_count as f64,
    );
    metrics.emit(
        &metric_path(&[prefix, name, "status"]),
        match collector.state.status {
            CollectorStatus::Up => 2.0,
            CollectorStatus::Down => 1.0,
            CollectorStatus::Unknown => 0.0,
        },
    );

    for peer_id in view.iter_peer_ids() {
        let p = view.peer(peer_id);
        let peer_label = p.signature.peer_ip.to_string();
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "fsm"]),
            fsm_metric_value(p.fsm_state),
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "ref_rib_start_ts"]),
            p.ref_rib_start_ts as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "ref_rib_end_ts"]),
            p.ref_rib_end_ts as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "uc_rib_start_ts"]),
            p.uc_rib_start_ts as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "uc_rib_end_ts"]),
            p.uc_rib_end_ts as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "update_count"]),
            p.update_count as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "rib_row_count"]),
            p.rib_row_count as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "state_msg_count"]),
            p.state_msg_count as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "positive_mismatch_count"]),
            p.positive_mismatch_count as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "negative_mismatch_count"]),
            p.negative_mismatch_count as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "announcing_asn_cardinality"]),
            p.announcing_asns.len() as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "announced_prefix_cardinality"]),
            p.announced_prefixes.len() as f64,
        );
        metrics.emit(
            &metric_path(&[prefix, name, &peer_label, "withdrawn_prefix_cardinality"]),
            p.withdrawn_prefixes.len() as f64,
        );
    }
}
