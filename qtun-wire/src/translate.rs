//! Endpoint address translation.
//!
//! Packets leaving the host carry the inward address as their source and leave the tunnel
//! with the outward one. Replies addressed to the outward address are handed back to the
//! inward one. Only the rewritten address and the affected checksums change.

use std::{net::Ipv4Addr, ops::Range};

use crate::{checksum::Accumulator, header::Protocol};

const IP_CHECKSUM: Range<usize> = 10..12;
const IP_SOURCE: Range<usize> = 12..16;
const IP_DESTINATION: Range<usize> = 16..20;

/// Offset of the checksum field inside a TCP header.
const TCP_CHECKSUM_OFFSET: usize = 16;
/// Offset of the checksum field inside a UDP header.
const UDP_CHECKSUM_OFFSET: usize = 6;

/// Which address, if any, [`translate`] rewrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// The source was the inward address and now is the outward one.
    Outbound,
    /// The destination was the outward address and now is the inward one.
    Inbound,
    /// Neither address belonged to the tunnel; the packet is unchanged.
    Untouched,
}

/// Rewrites the tunnel endpoint address of an IPv4 packet in place and patches the IP, TCP
/// and UDP checksums incrementally.
///
/// - source == `inward`: the source becomes `outward`.
/// - otherwise, destination == `outward`: the destination becomes `inward`.
/// - otherwise nothing changes.
///
/// The packet must have been validated with
/// [`Ipv4View::parse`](crate::header::Ipv4View::parse). Transport checksums that fall
/// outside the buffer are left alone. A zero UDP checksum means "no checksum" (RFC 768) and
/// is kept as is.
pub fn translate(packet: &mut [u8], inward: Ipv4Addr, outward: Ipv4Addr) -> Translation {
    let mut acc = Accumulator::new();

    let translation = if packet[IP_SOURCE] == inward.octets() {
        replace(packet, IP_SOURCE, outward, &mut acc);
        Translation::Outbound
    } else if packet[IP_DESTINATION] == outward.octets() {
        replace(packet, IP_DESTINATION, inward, &mut acc);
        Translation::Inbound
    } else {
        Translation::Untouched
    };

    acc.adjust(&mut packet[IP_CHECKSUM]);

    let header_len = usize::from(packet[0] & 0x0F) * 4;
    match Protocol::from(packet[9]) {
        Protocol::TCP => {
            let offset = header_len + TCP_CHECKSUM_OFFSET;
            if let Some(field) = packet.get_mut(offset..offset + 2) {
                acc.adjust(field);
            }
        }
        Protocol::UDP => {
            let offset = header_len + UDP_CHECKSUM_OFFSET;
            if let Some(field) = packet.get_mut(offset..offset + 2) {
                if *field != [0u8, 0] {
                    acc.adjust(field);
                    // A computed zero goes on the wire as all ones.
                    if *field == [0u8, 0] {
                        field.copy_from_slice(&[0xFF, 0xFF]);
                    }
                }
            }
        }
        Protocol::ICMP | Protocol::Other(_) => {}
    }

    translation
}

fn replace(packet: &mut [u8], range: Range<usize>, addr: Ipv4Addr, acc: &mut Accumulator) {
    acc.accumulate(&packet[range.clone()], false);
    packet[range.clone()].copy_from_slice(&addr.octets());
    acc.accumulate(&packet[range], true);
}
