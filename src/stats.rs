//! Controller statistics counters.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use serde::Serialize;

/// Monotonic command/reconnection counters plus the uptime origin.
///
/// Shared between the dispatcher (command outcomes) and the link task
/// (reconnections); read by the status surface. All counters only grow.
#[derive(Debug)]
pub struct Stats {
    commands_sent: AtomicU64,
    commands_failed: AtomicU64,
    reconnections: AtomicU64,
    started_at: Instant,
}

/// Read-only snapshot exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub commands_sent: u64,
    pub commands_failed: u64,
    pub reconnections: u64,
    pub uptime_seconds: u64,
    pub success_rate: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            commands_sent: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            reconnections: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let sent = self.commands_sent.load(Ordering::Relaxed);
        let failed = self.commands_failed.load(Ordering::Relaxed);
        let total = sent + failed;
        StatsSnapshot {
            commands_sent: sent,
            commands_failed: failed,
            reconnections: self.reconnections.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            success_rate: if total > 0 {
                sent as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
