//! Read-only views over the headers the tunnel inspects.
//!
//! Only the IPv4 header is validated up front. The TCP header is decoded on demand, when a
//! rule needs the handshake flags.
//!
//! ```
//! use std::net::Ipv4Addr;
//!
//! use qtun_wire::{Ipv4View, Protocol};
//!
//! let mut packet = [0u8; 28];
//! packet[0] = 0x45;
//! packet[3] = 28;
//! packet[9] = 17;
//! packet[12..16].copy_from_slice(&[10, 0, 0, 1]);
//!
//! let view = Ipv4View::parse(&packet).unwrap();
//! assert_eq!(view.source(), Ipv4Addr::new(10, 0, 0, 1));
//! assert_eq!(view.protocol(), Protocol::UDP);
//! assert!(view.tcp().is_none());
//! ```

use std::net::Ipv4Addr;

use pnet::packet::{
    ipv4::Ipv4Packet,
    tcp::{TcpFlags, TcpPacket},
};
use thiserror::Error;

/// Largest datagram read from the virtual interface in one go.
pub const MAX_PACKET_SIZE: usize = 2000;

/// Length of an IPv4 header without options.
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// Length of a TCP header without options.
pub const TCP_MIN_HEADER_LEN: usize = 20;

/// Reasons a buffer is not a well-formed IPv4 datagram.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// The buffer is shorter than the fixed part of an IPv4 header.
    #[error("packet too short for an IPv4 header: {0} bytes")]
    Truncated(usize),
    /// The version nibble is not 4.
    #[error("not an IPv4 packet (version {0})")]
    Version(u8),
    /// The IHL is below 5 words or points past the end of the buffer.
    #[error("invalid IPv4 header length: {0} bytes")]
    HeaderLength(usize),
    /// The total length field is shorter than the header or longer than the buffer.
    #[error("IPv4 total length {total} does not fit in {available} bytes")]
    TotalLength { total: usize, available: usize },
}

/// IP protocol numbers the tunnel cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Protocol {
    /// Protocol number 1.
    ICMP,
    /// Protocol number 6.
    TCP,
    /// Protocol number 17.
    UDP,
    /// Any other protocol number.
    Other(u8),
}

impl Protocol {
    /// The number carried in the IPv4 protocol field.
    pub const fn number(self) -> u8 {
        match self {
            Self::ICMP => 1,
            Self::TCP => 6,
            Self::UDP => 17,
            Self::Other(n) => n,
        }
    }
}

impl From<u8> for Protocol {
    fn from(n: u8) -> Self {
        match n {
            1 => Self::ICMP,
            6 => Self::TCP,
            17 => Self::UDP,
            n => Self::Other(n),
        }
    }
}

/// A validated, zero-copy view over the IPv4 header at the start of a buffer.
///
/// Construction checks the version, the header length and the total length against the
/// buffer, so every offset used afterwards (by the view or by
/// [`translate`](crate::translate::translate)) is in bounds.
#[derive(Debug)]
pub struct Ipv4View<'a> {
    buf: &'a [u8],
    packet: Ipv4Packet<'a>,
    header_len: usize,
    total_len: usize,
}

impl<'a> Ipv4View<'a> {
    /// Validates the IPv4 header at the start of `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<Self, HeaderError> {
        let packet = Ipv4Packet::new(buf).ok_or(HeaderError::Truncated(buf.len()))?;

        let version = packet.get_version();
        if version != 4 {
            return Err(HeaderError::Version(version));
        }

        let header_len = usize::from(packet.get_header_length()) * 4;
        if header_len < IPV4_MIN_HEADER_LEN || header_len > buf.len() {
            return Err(HeaderError::HeaderLength(header_len));
        }

        let total_len = usize::from(packet.get_total_length());
        if total_len < header_len || total_len > buf.len() {
            return Err(HeaderError::TotalLength { total: total_len, available: buf.len() });
        }

        Ok(Self { buf, packet, header_len, total_len })
    }

    /// Source address.
    #[inline]
    pub fn source(&self) -> Ipv4Addr {
        self.packet.get_source()
    }

    /// Destination address.
    #[inline]
    pub fn destination(&self) -> Ipv4Addr {
        self.packet.get_destination()
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.packet.get_next_level_protocol().0)
    }

    /// Header length in bytes, options included.
    #[inline]
    pub const fn header_len(&self) -> usize {
        self.header_len
    }

    /// The total length field of the header.
    #[inline]
    pub const fn total_len(&self) -> usize {
        self.total_len
    }

    /// Decodes the TCP header following the IP header. Returns `None` if the packet does not
    /// carry TCP or the segment is too short to hold a TCP header.
    pub fn tcp(&self) -> Option<TcpView<'a>> {
        if self.protocol() != Protocol::TCP {
            return None;
        }

        let segment = &self.buf[self.header_len..self.total_len];
        if segment.len() < TCP_MIN_HEADER_LEN {
            return None;
        }

        TcpPacket::new(segment).map(|packet| TcpView { packet })
    }
}

/// A zero-copy view over a TCP header.
#[derive(Debug)]
pub struct TcpView<'a> {
    packet: TcpPacket<'a>,
}

impl TcpView<'_> {
    #[inline]
    pub fn syn(&self) -> bool {
        self.packet.get_flags() & TcpFlags::SYN != 0
    }

    #[inline]
    pub fn ack(&self) -> bool {
        self.packet.get_flags() & TcpFlags::ACK != 0
    }

    /// True for the second segment of the three-way handshake, the only one carrying both
    /// SYN and ACK.
    #[inline]
    pub fn is_syn_ack(&self) -> bool {
        self.syn() && self.ack()
    }
}
