//! Everything qtun does to the host outside of the tunnel itself: configuring routes,
//! forwarding and NAT around the interface, and resolving rule targets.

pub mod command;

mod resolver;
pub use resolver::SystemResolver;

mod setup;
pub use setup::{HostSetup, Plan, Platform, SetupConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] command::Error),
    #[error("host setup is not supported on this platform")]
    UnsupportedPlatform,
}

pub type Result<T> = std::result::Result<T, Error>;
