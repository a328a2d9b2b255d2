//! # bgp-routing-tables
//!
//! A routing-tables engine: folds a stream of BGP observations — RIB
//! dumps and incremental updates, announcements, withdrawals, and peer
//! state changes — from many route-collection vantage points into a
//! consistent, timestamped [`View`](view::View) per collector, and
//! publishes it at regular intervals.
//!
//! This crate covers the engine itself: the data model (peers, prefixes,
//! per-(prefix,peer) cells) and the protocol that folds records into that
//! model while a new RIB may be under construction in parallel with the
//! live view. Record acquisition/parsing, transport of published views,
//! metric export, and configuration loading are external collaborators,
//! defined only by the trait boundaries this crate exposes:
//! [`record::RecordSource`], [`sink::ViewSink`], [`sink::MetricsSink`].
//!
//! ```
//! use bgp_routing_tables::config::EngineConfig;
//! use bgp_routing_tables::engine::Engine;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.interval_start(0);
//! // engine.ingest_record(record)?; // fed by a RecordSource implementation
//! ```

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod folder;
pub mod origin;
pub mod peer_registry;
pub mod prefix_trie;
pub mod reconcile;
pub mod record;
pub mod sink;
pub mod view;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use origin::Origin;
