//! Read-only health snapshot for external monitoring.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use marketpulse_core::error::Result;

use crate::store::ActionStore;

/// Queue partition counts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueCounts {
    /// Eligible for dispatch right now.
    pub ready_now: u64,
    /// Pending/retry with a future `scheduled_for`.
    pub scheduled_future: u64,
    /// In progress with a claim old enough to look wedged.
    pub stuck_in_progress: u64,
}

/// Trailing execution statistics from the audit log.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionStats {
    pub attempts: u64,
    pub successes: u64,
    /// None when the window holds no attempts.
    pub avg_duration_ms: Option<f64>,
}

/// Aggregate snapshot served to the monitoring collaborator.
///
/// Strictly read-only; safe to poll frequently.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub queue: QueueCounts,
    /// Last-24h execution statistics.
    pub last_24h: ExecutionStats,
    pub snapshot_at: DateTime<Utc>,
}

impl SystemHealth {
    /// Assemble a snapshot against `reference_now`.
    pub fn gather(store: &ActionStore, reference_now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            queue: store.queue_counts(reference_now)?,
            last_24h: store.execution_stats_since(reference_now - Duration::hours(24))?,
            snapshot_at: reference_now,
        })
    }

    /// Failure count over the window.
    pub fn failures_24h(&self) -> u64 {
        self.last_24h.attempts - self.last_24h.successes
    }
}

impl std::fmt::Display for SystemHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "queue:")?;
        writeln!(f, "  ready now:         {}", self.queue.ready_now)?;
        writeln!(f, "  scheduled (later): {}", self.queue.scheduled_future)?;
        writeln!(f, "  stuck in progress: {}", self.queue.stuck_in_progress)?;
        writeln!(f, "last 24h:")?;
        writeln!(f, "  attempts:  {}", self.last_24h.attempts)?;
        writeln!(f, "  successes: {}", self.last_24h.successes)?;
        writeln!(f, "  failures:  {}", self.failures_24h())?;
        match self.last_24h.avg_duration_ms {
            Some(ms) => writeln!(f, "  avg duration: {ms:.0} ms"),
            None => writeln!(f, "  avg duration: n/a"),
        }
    }
}
