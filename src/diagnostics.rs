//! Dropped-node diagnostics (§7): the engine never aborts a multi-step
//! computation over a single geometric failure, but every drop is counted
//! here so callers can tell "sound but a bit blind" apart from "broken".

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Diagnostics {
    propagation_dropped: AtomicU64,
    degenerate_dropped: AtomicU64,
    projection_dropped: AtomicU64,
    obstacles_omitted: AtomicU64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_propagation_dropped(&self) {
        self.propagation_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degenerate_dropped(&self) {
        self.degenerate_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_projection_dropped(&self) {
        self.projection_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_obstacle_omitted(&self) {
        self.obstacles_omitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn propagation_dropped(&self) -> u64 {
        self.propagation_dropped.load(Ordering::Relaxed)
    }

    pub fn degenerate_dropped(&self) -> u64 {
        self.degenerate_dropped.load(Ordering::Relaxed)
    }

    pub fn projection_dropped(&self) -> u64 {
        self.projection_dropped.load(Ordering::Relaxed)
    }

    pub fn obstacles_omitted(&self) -> u64 {
        self.obstacles_omitted.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.propagation_dropped() + self.degenerate_dropped() + self.projection_dropped()
    }
}
