//! The virtual interface the tunnel reads packets from and writes packets to.

use std::io;

use thiserror::Error;

mod memory;
mod tun;

pub use memory::{MemoryDevice, MemoryHandle};
pub use tun::TunDevice;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),
    #[error("invalid interface name {0:?}")]
    Name(String),
    #[error("TUN devices are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A point-to-point interface carrying raw IPv4 datagrams, one per call.
#[async_trait::async_trait]
pub trait Device: Send {
    /// The OS-assigned interface name.
    fn name(&self) -> &str;

    /// Waits for the next datagram and copies it into `buf`, returning its length. A datagram
    /// longer than `buf` is truncated.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one datagram.
    async fn send(&mut self, packet: &[u8]) -> io::Result<()>;
}
