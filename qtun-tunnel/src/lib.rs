//! The packet dispatch loop.
//!
//! Every datagram read from the tunnel device is matched against the rule set, last rule
//! first. The first matching rule's quota decides whether the packet is translated and
//! written back or dropped:
//!
//! - data rules charge the packet's length, as long as the count is still below the limit;
//! - time rules admit TCP and ICMP packets while the count is below the limit and start the
//!   rule's one-second timer when a connection is established (SYN+ACK).
//!
//! Packets no rule matches are forwarded if they are UDP, so name resolution keeps working
//! through the tunnel, and dropped otherwise.

use std::{io, net::Ipv4Addr};

mod stats;
pub use stats::TunnelStats;

mod status;
pub use status::{ChannelSink, NoopSink, StatusEvent, StatusSink};

mod tunnel;
pub use tunnel::{DropReason, Tunnel, Verdict};

/// Interface failures. Both end the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// Reading the next datagram from the device failed.
    #[error("failed to read from tunnel device: {0}")]
    Read(#[source] io::Error),
    /// Writing an admitted datagram back to the device failed.
    #[error("failed to write to tunnel device: {0}")]
    Write(#[source] io::Error),
}

/// The two endpoint addresses the tunnel translates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Source address of packets coming from the host.
    pub inward: Ipv4Addr,
    /// Address presented to the rest of the network.
    pub outward: Ipv4Addr,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self { inward: Ipv4Addr::new(10, 0, 0, 1), outward: Ipv4Addr::new(10, 0, 0, 2) }
    }
}
