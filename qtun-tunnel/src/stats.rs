use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{DropReason, Verdict};

/// Packet counters of a tunnel.
/// These are shared between the dispatch loop and whoever holds a handle to them.
#[derive(Debug, Default)]
pub struct TunnelStats {
    /// Total packets read from the device
    read: AtomicUsize,
    /// Total packets written back to the device
    forwarded: AtomicUsize,
    /// Total packets dropped because their rule's quota was used up
    denied: AtomicUsize,
    /// Total non-UDP packets dropped because no rule matched
    unmatched: AtomicUsize,
    /// Total packets dropped because their headers could not be parsed
    malformed: AtomicUsize,
    /// Total packets dropped because their protocol cannot be charged against the rule
    unsupported: AtomicUsize,
}

impl TunnelStats {
    #[inline]
    pub(crate) fn increment_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Forward(_) => &self.forwarded,
            Verdict::Drop(DropReason::LimitReached) => &self.denied,
            Verdict::Drop(DropReason::Unmatched) => &self.unmatched,
            Verdict::Drop(DropReason::Malformed) => &self.malformed,
            Verdict::Drop(DropReason::Unsupported) => &self.unsupported,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn read(&self) -> usize {
        self.read.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn denied(&self) -> usize {
        self.denied.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unmatched(&self) -> usize {
        self.unmatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn malformed(&self) -> usize {
        self.malformed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unsupported(&self) -> usize {
        self.unsupported.load(Ordering::Relaxed)
    }
}
