//! Engine configuration (spec §6).
//!
//! Loading this from a file, environment, or CLI flags is an external
//! collaborator's job; this crate only defines the shape and its defaults.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A typical IPv4 DFZ full-table size at the time this default was chosen.
/// Collectors below this threshold for a peer are not considered full-feed.
const DEFAULT_V4_FULLFEED_THRESHOLD: u32 = 400_000;
const DEFAULT_V6_FULLFEED_THRESHOLD: u32 = 40_000;

/// §4.F.2: window before RIB start during which a live update is assumed
/// to have been sitting in the collector's backlog rather than genuinely
/// preceding the RIB.
const DEFAULT_BACKLOG_WINDOW_SECS: u32 = 60;
/// §4.F.2: how long (in BGP record time) a peer that never got a RIB row
/// can go without an update before it's demoted to `Unknown`.
const DEFAULT_INACTIVE_TIMEOUT_SECS: u32 = 3_600;
/// §4.D: cadence at which the wall-clock display time is refreshed.
const DEFAULT_WALL_UPDATE_PERIOD_SECS: u32 = 60;

/// Engine-wide configuration, matching the options enumerated in spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub v4_fullfeed_threshold: u32,
    pub v6_fullfeed_threshold: u32,
    pub metric_prefix: String,
    pub metrics_enabled: bool,
    pub publish_partial_feeds: bool,
    pub backlog_window_secs: u32,
    pub inactive_timeout_secs: u32,
    pub wall_update_period_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            v4_fullfeed_threshold: DEFAULT_V4_FULLFEED_THRESHOLD,
            v6_fullfeed_threshold: DEFAULT_V6_FULLFEED_THRESHOLD,
            metric_prefix: "bgp".to_string(),
            metrics_enabled: true,
            publish_partial_feeds: false,
            backlog_window_secs: DEFAULT_BACKLOG_WINDOW_SECS,
            inactive_timeout_secs: DEFAULT_INACTIVE_TIMEOUT_SECS,
            wall_update_period_secs: DEFAULT_WALL_UPDATE_PERIOD_SECS,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-table threshold used to decide whether a peer counts as a
    /// full feed, per address family. Setting `publish_partial_feeds(true)`
    /// overrides both thresholds to zero, so every peer is considered a
    /// full feed regardless of prefix counts.
    pub fn v4_fullfeed_threshold(&mut self, n: u32) -> &mut Self {
        self.v4_fullfeed_threshold = n;
        self
    }

    pub fn v6_fullfeed_threshold(&mut self, n: u32) -> &mut Self {
        self.v6_fullfeed_threshold = n;
        self
    }

    pub fn metric_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.metric_prefix = prefix.into();
        self
    }

    pub fn metrics_enabled(&mut self, yes: bool) -> &mut Self {
        self.metrics_enabled = yes;
        self
    }

    /// When `yes`, both full-feed thresholds are forced to zero so every
    /// peer (even a partial feed) is accepted by the interval driver's
    /// full-feed filter.
    pub fn publish_partial_feeds(&mut self, yes: bool) -> &mut Self {
        self.publish_partial_feeds = yes;
        if yes {
            self.v4_fullfeed_threshold = 0;
            self.v6_fullfeed_threshold = 0;
        }
        self
    }

    pub fn backlog_window_secs(&mut self, secs: u32) -> &mut Self {
        self.backlog_window_secs = secs;
        self
    }

    pub fn inactive_timeout_secs(&mut self, secs: u32) -> &mut Self {
        self.inactive_timeout_secs = secs;
        self
    }

    pub fn wall_update_period_secs(&mut self, secs: u32) -> &mut Self {
        self.wall_update_period_secs = secs;
        self
    }
}
