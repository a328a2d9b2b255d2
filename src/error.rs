use thiserror::Error;

/// Errors the engine can produce while folding records into the view.
///
/// Only [`EngineError::ResourceExhausted`] is returned from
/// [`crate::engine::Engine::ingest_record`] as a hard stop — everything
/// else is either counted on the relevant [`crate::collector::CollectorState`]
/// or logged and otherwise absorbed, per the policy in spec §7.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A data-model invariant (§3) was about to be violated. This should
    /// never happen; it indicates a bug in the folder/reconciler rather
    /// than bad input, so it is reported with as much context as possible.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A single element inside an otherwise-valid record was malformed
    /// (e.g. a path whose first segment doesn't sanity-check against the
    /// peer's ASN). The record continues; only this element is skipped.
    #[error("protocol error on element for peer {peer_ip} ({reason})")]
    Protocol {
        peer_ip: std::net::IpAddr,
        reason: String,
    },

    /// The source signalled a corrupted record for this collector at `ts`.
    #[error("corrupted record for collector {collector} at ts={ts}")]
    CorruptedRecord { collector: String, ts: u32 },

    /// The engine cannot accept further records (e.g. the peer or cell
    /// table would outgrow configured limits). Fatal: the driver must stop.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A [`crate::sink::ViewSink`] or [`crate::sink::MetricsSink`] failed.
    /// Logged, never fatal to the engine.
    #[error("sink failure: {0}")]
    Sink(String),
}
