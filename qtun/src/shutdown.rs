//! Interrupt handling around the tunnel.
//!
//! The interrupt listener is registered before the host is touched, so a SIGINT that
//! arrives while the interface is being configured is held until the tunnel starts, and then
//! leads to the usual teardown instead of killing the process.

use std::{future::Future, io};

use qtun_device::Device;
use qtun_tunnel::{StatusSink, Tunnel};

use crate::Error;

/// A registered SIGINT listener.
#[derive(Debug)]
pub struct Interrupt {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Interrupt {
    /// Installs the handler right away. Interrupts delivered from now on are buffered until
    /// [`Interrupt::recv`] is polled.
    ///
    /// Must be called inside a Tokio runtime.
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self { signal: signal(SignalKind::interrupt())? })
    }

    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next interrupt.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        // `None` only once the runtime shuts down; never return early in that case.
        if self.signal.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs the tunnel until it fails or `interrupt` completes.
pub async fn drive<D, S, F>(mut tunnel: Tunnel<D, S>, interrupt: F) -> Result<(), Error>
where
    D: Device,
    S: StatusSink,
    F: Future<Output = ()>,
{
    tokio::select! {
        result = tunnel.run() => result.map_err(Error::from),
        () = interrupt => Err(Error::Interrupted),
    }
}
