use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic delivery accounting. Every accepted message ends up in exactly
/// one of the other three buckets once the scheduler has stopped:
/// `accepted == delivered + redistribution_dropped + discarded_at_stop`.
#[derive(Default)]
pub(crate) struct SchedulerStats {
    accepted: AtomicU64,
    delivered: AtomicU64,
    redistribution_dropped: AtomicU64,
    discarded_at_stop: AtomicU64,
}

impl SchedulerStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_redistribution_dropped(&self, count: u64) {
        self.redistribution_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded_at_stop(&self, count: u64) {
        self.discarded_at_stop.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            redistribution_dropped: self.redistribution_dropped.load(Ordering::Relaxed),
            discarded_at_stop: self.discarded_at_stop.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a scheduler's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages successfully enqueued by `send`.
    pub accepted: u64,
    /// Messages whose handler ran to completion.
    pub delivered: u64,
    /// Messages lost because a drained mailbox found no surviving receiver.
    pub redistribution_dropped: u64,
    /// Messages still queued when the scheduler stopped.
    pub discarded_at_stop: u64,
}

impl StatsSnapshot {
    /// Sum of all terminal buckets; equals `accepted` on a stopped scheduler.
    pub fn accounted(&self) -> u64 {
        self.delivered + self.redistribution_dropped + self.discarded_at_stop
    }
}
