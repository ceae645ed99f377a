use std::io;

use tokio::sync::mpsc;

use crate::Device;

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// An in-process [`Device`]. Packets injected through the paired [`MemoryHandle`] are
/// received by the device, packets sent by the device show up on the handle.
///
/// Receiving fails with [`io::ErrorKind::UnexpectedEof`] once the handle is dropped, the same
/// way a torn-down interface would.
#[derive(Debug)]
pub struct MemoryDevice {
    name: String,
    ingress: mpsc::Receiver<Vec<u8>>,
    egress: mpsc::UnboundedSender<Vec<u8>>,
}

/// The far side of a [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryHandle {
    ingress: mpsc::Sender<Vec<u8>>,
    egress: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryDevice {
    pub fn pair(name: impl Into<String>) -> (Self, MemoryHandle) {
        let (ingress_tx, ingress_rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
        let (egress_tx, egress_rx) = mpsc::unbounded_channel();

        let device = Self { name: name.into(), ingress: ingress_rx, egress: egress_tx };
        let handle = MemoryHandle { ingress: ingress_tx, egress: egress_rx };

        (device, handle)
    }
}

#[async_trait::async_trait]
impl Device for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let packet = self
            .ingress
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "device closed"))?;

        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok(len)
    }

    async fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.egress
            .send(packet.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "device closed"))
    }
}

impl MemoryHandle {
    /// Hands a packet to the device.
    pub async fn inject(&self, packet: impl Into<Vec<u8>>) -> io::Result<()> {
        self.ingress
            .send(packet.into())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "device dropped"))
    }

    /// Waits for the next packet written by the device. Returns `None` once the device is
    /// dropped and every written packet has been taken.
    pub async fn next_sent(&mut self) -> Option<Vec<u8>> {
        self.egress.recv().await
    }

    /// Returns a packet written by the device, if one is ready.
    pub fn try_next_sent(&mut self) -> Option<Vec<u8>> {
        self.egress.try_recv().ok()
    }
}
