use std::{fmt, sync::Arc};

use qtun_rules::LimitKind;
use tokio::sync::mpsc;

/// What happened to a packet that matched a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The packet was admitted and forwarded.
    Forwarded {
        /// Index of the rule in the rule set.
        rule: usize,
        label: Arc<str>,
        kind: LimitKind,
        /// Bytes transferred or seconds elapsed so far, in base units.
        count: u64,
        limit: u64,
    },
    /// The packet was dropped because the rule's quota is used up.
    LimitReached { rule: usize, label: Arc<str>, kind: LimitKind, limit: u64 },
}

impl StatusEvent {
    #[inline]
    pub const fn rule(&self) -> usize {
        match self {
            Self::Forwarded { rule, .. } | Self::LimitReached { rule, .. } => *rule,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        match self {
            Self::Forwarded { label, .. } | Self::LimitReached { label, .. } => label,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forwarded { rule, label, kind, count, limit } => {
                let progress = match kind {
                    LimitKind::Data => "bytes transfered",
                    LimitKind::Time => "sec time passed",
                };
                write!(f, "write packet for {label}, {count} of {limit} {progress} for rule #{rule}")
            }
            Self::LimitReached { rule, label, kind, limit } => {
                write!(f, "{label} limit {limit} {} reached for rule #{rule}", kind.base_unit())
            }
        }
    }
}

/// Receives a [`StatusEvent`] for every packet that matched a rule.
///
/// Sinks are called inline by the dispatch loop and must not block.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StatusSink for NoopSink {
    #[inline]
    fn emit(&self, _event: StatusEvent) {}
}

/// Forwards events over an unbounded channel. Events emitted after the receiver is dropped
/// are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    #[inline]
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event)
    }
}
