//! qtun forwards the traffic of a TUN interface under per-destination quotas.
//!
//! The crates of the workspace are re-exported as modules; the types needed to assemble a
//! tunnel are also available at the root.

pub use qtun_device as device;
pub use qtun_net as net;
pub use qtun_rules as rules;
pub use qtun_tunnel as tunnel;
pub use qtun_wire as wire;

pub use qtun_device::{Device, MemoryDevice, TunDevice};
pub use qtun_net::{HostSetup, SetupConfig, SystemResolver};
pub use qtun_rules::{load, load_file, RuleSet};
pub use qtun_tunnel::{StatusEvent, StatusSink, Tunnel, TunnelConfig, TunnelError};

pub mod cli;
pub mod shutdown;
pub mod status;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to load rules: {0}")]
    Rules(#[from] qtun_rules::Error),
    #[error("device error: {0}")]
    Device(#[from] qtun_device::Error),
    #[error("host setup failed: {0}")]
    Setup(#[from] qtun_net::Error),
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
    #[error("failed to listen for interrupts: {0}")]
    Signal(#[source] std::io::Error),
    #[error("interrupted")]
    Interrupted,
}
