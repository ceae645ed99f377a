use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::MissedTickBehavior;

/// Interval between two increments of a time quota.
pub const TICK: Duration = Duration::from_secs(1);

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The packet may pass. Carries the counter after charging the packet.
    Admitted(u64),
    /// The quota is used up. Carries the counter at the time of the check.
    Denied(u64),
}

impl Admission {
    #[inline]
    pub const fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// The mutable half of a rule: a monotonic counter compared against a fixed ceiling.
///
/// Quotas are shared between the dispatch loop and, for time quotas, one background timer
/// task. The loop only charges data quotas and starts timers; the timer task is the only
/// writer of a time quota's counter and is the only one that ever stops itself.
#[derive(Debug)]
pub struct Quota {
    limit: u64,
    /// Bytes or seconds used so far.
    count: AtomicU64,
    /// Set while a timer task is ticking this quota.
    timer_active: AtomicBool,
}

impl Quota {
    pub const fn new(limit: u64) -> Self {
        Self { limit, count: AtomicU64::new(0), timer_active: AtomicBool::new(false) }
    }

    #[inline]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.count() >= self.limit
    }

    #[inline]
    pub fn timer_active(&self) -> bool {
        self.timer_active.load(Ordering::Acquire)
    }

    /// Admits a packet of `len` bytes against a data quota.
    ///
    /// The decision is taken on the counter *before* the packet is charged, so the last
    /// admitted packet can push the counter past the limit.
    pub fn admit_data(&self, len: u64) -> Admission {
        if self.is_exhausted() {
            return Admission::Denied(self.count());
        }

        let charged = self.count.fetch_add(len, Ordering::AcqRel).saturating_add(len);
        Admission::Admitted(charged)
    }

    /// Admits a packet against a time quota. Nothing is charged, the timer does that.
    pub fn admit_time(&self) -> Admission {
        let count = self.count();
        if count < self.limit {
            Admission::Admitted(count)
        } else {
            Admission::Denied(count)
        }
    }

    /// Adds one second to the counter unless the limit has been reached. Returns `false` once
    /// the limit is reached, which tells the timer to stop.
    pub fn tick(&self) -> bool {
        let limit = self.limit;
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < limit).then_some(count + 1)
            })
            .is_ok()
    }

    /// Starts the per-second timer of this quota on the current Tokio runtime, unless one is
    /// already running. Returns `true` if a new timer was spawned.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn start_timer(self: &Arc<Self>) -> bool {
        if self
            .timer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        tokio::spawn(Self::run_timer(Arc::clone(self)));
        true
    }

    async fn run_timer(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        tracing::debug!(limit = self.limit, "quota timer started");

        loop {
            interval.tick().await;
            if !self.tick() {
                break;
            }
            tracing::trace!(count = self.count(), limit = self.limit, "quota timer tick");
        }

        self.timer_active.store(false, Ordering::Release);
        tracing::debug!(count = self.count(), limit = self.limit, "quota timer stopped");
    }
}
