use std::{io, net::Ipv4Addr, time::Duration};

use qtun_device::{Device, MemoryDevice};
use qtun_rules::{LimitKind, Matcher, Rule, RuleSet};
use qtun_tunnel::{
    ChannelSink, DropReason, StatusEvent, Tunnel, TunnelConfig, TunnelError, Verdict,
};
use qtun_wire::{Protocol, Translation};

const INWARD: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const OUTWARD: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// Helper functions.
mod helpers {
    use pnet::packet::ipv4::{self, Ipv4Packet};

    use super::*;

    const SYN: u8 = 0x02;
    const ACK: u8 = 0x10;

    pub fn rule(cidr: &str, limit: &str) -> Rule {
        Rule::new(Matcher::Cidr(cidr.parse().unwrap()), cidr, limit.parse().unwrap())
    }

    /// Builds an IPv4 packet of exactly `total` bytes carrying the given protocol.
    pub fn packet(protocol: Protocol, src: Ipv4Addr, dst: Ipv4Addr, total: usize) -> Vec<u8> {
        let mut buf = vec![0u8; total];
        buf[0] = 0x45;
        buf[2..4].copy_from_slice(&(total as u16).to_be_bytes());
        buf[8] = 64;
        buf[9] = protocol.number();
        buf[12..16].copy_from_slice(&src.octets());
        buf[16..20].copy_from_slice(&dst.octets());

        match protocol {
            Protocol::TCP => buf[32] = 5 << 4,
            Protocol::UDP => buf[24..26].copy_from_slice(&((total - 20) as u16).to_be_bytes()),
            _ => {}
        }

        let checksum = ipv4::checksum(&Ipv4Packet::new(&buf).unwrap());
        buf[10..12].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    pub fn tcp(src: Ipv4Addr, dst: Ipv4Addr, flags: u8) -> Vec<u8> {
        let mut buf = packet(Protocol::TCP, src, dst, 60);
        buf[33] = flags;
        buf
    }

    pub fn syn_ack(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        tcp(src, dst, SYN | ACK)
    }

    pub fn data(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        tcp(src, dst, ACK)
    }

    pub fn source(packet: &[u8]) -> Ipv4Addr {
        Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15])
    }

    pub fn destination(packet: &[u8]) -> Ipv4Addr {
        Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19])
    }
}

use helpers::*;

fn tunnel(rules: Vec<Rule>) -> Tunnel<MemoryDevice> {
    let (device, _handle) = MemoryDevice::pair("mem0");
    Tunnel::new(device, RuleSet::new(rules), TunnelConfig::default())
}

#[tokio::test]
async fn unmatched_udp_is_forwarded_everything_else_dropped() {
    let _ = tracing_subscriber::fmt::try_init();

    let tunnel = tunnel(vec![rule("93.184.216.0/24", "1kb")]);
    let dns = Ipv4Addr::new(1, 1, 1, 1);

    let mut udp = packet(Protocol::UDP, INWARD, dns, 60);
    assert_eq!(tunnel.process(&mut udp), Verdict::Forward(Translation::Outbound));
    assert_eq!(source(&udp), OUTWARD);

    let mut tcp = data(INWARD, dns);
    assert_eq!(tunnel.process(&mut tcp), Verdict::Drop(DropReason::Unmatched));
    assert_eq!(source(&tcp), INWARD);

    let mut icmp = packet(Protocol::ICMP, INWARD, dns, 28);
    assert_eq!(tunnel.process(&mut icmp), Verdict::Drop(DropReason::Unmatched));

    let stats = tunnel.stats();
    assert_eq!(stats.forwarded(), 1);
    assert_eq!(stats.unmatched(), 2);
}

#[tokio::test]
async fn later_rules_take_priority() {
    let (sink, mut events) = ChannelSink::new();
    let tunnel =
        tunnel(vec![rule("0.0.0.0/0", "1gb"), rule("93.184.216.0/24", "1kb")]).with_sink(sink);

    let mut specific = packet(Protocol::UDP, INWARD, Ipv4Addr::new(93, 184, 216, 34), 100);
    assert!(tunnel.process(&mut specific).is_forward());

    let mut general = packet(Protocol::UDP, INWARD, Ipv4Addr::new(8, 8, 8, 8), 200);
    assert!(tunnel.process(&mut general).is_forward());

    assert_eq!(
        events.recv().await.unwrap(),
        StatusEvent::Forwarded {
            rule: 1,
            label: "93.184.216.0/24".into(),
            kind: LimitKind::Data,
            count: 100,
            limit: 1024,
        }
    );
    let event = events.recv().await.unwrap();
    assert_eq!(event.rule(), 0);
    assert_eq!(event.label(), "0.0.0.0/0");

    assert_eq!(tunnel.rules().get(0).unwrap().quota().count(), 200);
    assert_eq!(tunnel.rules().get(1).unwrap().quota().count(), 100);
}

#[tokio::test]
async fn data_quota_admits_until_count_reaches_limit() {
    let (sink, mut events) = ChannelSink::new();
    let tunnel = tunnel(vec![rule("93.184.216.0/24", "1kb")]).with_sink(sink);
    let remote = Ipv4Addr::new(93, 184, 216, 34);

    for expected in [400, 800, 1200] {
        let mut pkt = packet(Protocol::TCP, INWARD, remote, 400);
        assert_eq!(tunnel.process(&mut pkt), Verdict::Forward(Translation::Outbound));

        match events.recv().await.unwrap() {
            StatusEvent::Forwarded { count, .. } => assert_eq!(count, expected),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Replies are charged against the same rule.
    let mut reply = packet(Protocol::TCP, remote, OUTWARD, 40);
    assert_eq!(tunnel.process(&mut reply), Verdict::Drop(DropReason::LimitReached));
    assert_eq!(destination(&reply), OUTWARD);

    assert_eq!(
        events.recv().await.unwrap(),
        StatusEvent::LimitReached {
            rule: 0,
            label: "93.184.216.0/24".into(),
            kind: LimitKind::Data,
            limit: 1024,
        }
    );

    assert_eq!(tunnel.stats().forwarded(), 3);
    assert_eq!(tunnel.stats().denied(), 1);
}

#[tokio::test]
async fn replies_are_translated_inbound() {
    let tunnel = tunnel(vec![rule("0.0.0.0/0", "1mb")]);
    let remote = Ipv4Addr::new(93, 184, 216, 34);

    let mut reply = data(remote, OUTWARD);
    assert_eq!(tunnel.process(&mut reply), Verdict::Forward(Translation::Inbound));
    assert_eq!(source(&reply), remote);
    assert_eq!(destination(&reply), INWARD);
}

#[tokio::test(start_paused = true)]
async fn time_quota_starts_on_syn_ack_and_stops_at_limit() {
    let tunnel = tunnel(vec![rule("93.184.216.0/24", "3s")]);
    let remote = Ipv4Addr::new(93, 184, 216, 34);
    let quota = tunnel.rules().get(0).unwrap().quota().clone();

    // Nothing counts before a connection is established.
    assert!(tunnel.process(&mut data(INWARD, remote)).is_forward());
    assert!(tunnel.process(&mut packet(Protocol::ICMP, INWARD, remote, 28)).is_forward());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(quota.count(), 0);
    assert!(!quota.timer_active());

    assert!(tunnel.process(&mut syn_ack(remote, OUTWARD)).is_forward());
    assert!(quota.timer_active());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(quota.count(), 1);
    assert!(tunnel.process(&mut data(INWARD, remote)).is_forward());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(quota.count(), 3);
    assert!(!quota.timer_active());

    assert_eq!(
        tunnel.process(&mut data(INWARD, remote)),
        Verdict::Drop(DropReason::LimitReached)
    );
    assert_eq!(
        tunnel.process(&mut packet(Protocol::ICMP, INWARD, remote, 28)),
        Verdict::Drop(DropReason::LimitReached)
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_syn_ack_does_not_start_a_second_timer() {
    let tunnel = tunnel(vec![rule("93.184.216.0/24", "1m")]);
    let remote = Ipv4Addr::new(93, 184, 216, 34);
    let quota = tunnel.rules().get(0).unwrap().quota().clone();

    assert!(tunnel.process(&mut syn_ack(remote, OUTWARD)).is_forward());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(tunnel.process(&mut syn_ack(remote, OUTWARD)).is_forward());
    assert!(tunnel.process(&mut syn_ack(remote, OUTWARD)).is_forward());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(quota.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn tcp_without_full_header_is_admitted_without_timer() {
    let tunnel = tunnel(vec![rule("93.184.216.0/24", "1m")]);
    let remote = Ipv4Addr::new(93, 184, 216, 34);
    let quota = tunnel.rules().get(0).unwrap().quota().clone();

    // Four bytes of TCP, flags byte out of reach.
    let mut short = packet(Protocol::ICMP, remote, OUTWARD, 24);
    short[9] = Protocol::TCP.number();
    short[20..24].copy_from_slice(&[0x01, 0xbb, 0xc3, 0x50]);

    assert_eq!(tunnel.process(&mut short), Verdict::Forward(Translation::Inbound));
    assert!(!quota.timer_active());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(quota.count(), 0);
}

#[tokio::test]
async fn udp_under_time_rule_is_dropped() {
    let tunnel = tunnel(vec![rule("93.184.216.0/24", "10m")]);
    let mut udp = packet(Protocol::UDP, INWARD, Ipv4Addr::new(93, 184, 216, 34), 60);

    assert_eq!(tunnel.process(&mut udp), Verdict::Drop(DropReason::Unsupported));
    assert_eq!(source(&udp), INWARD);
    assert_eq!(tunnel.stats().unsupported(), 1);
}

#[tokio::test]
async fn malformed_packets_are_dropped() {
    let tunnel = tunnel(vec![rule("0.0.0.0/0", "1gb")]);

    let mut short = vec![0x45, 0, 0, 20];
    assert_eq!(tunnel.process(&mut short), Verdict::Drop(DropReason::Malformed));

    let mut v6 = packet(Protocol::UDP, INWARD, OUTWARD, 40);
    v6[0] = 0x60;
    assert_eq!(tunnel.process(&mut v6), Verdict::Drop(DropReason::Malformed));

    let mut overlong = packet(Protocol::UDP, INWARD, OUTWARD, 40);
    overlong[2..4].copy_from_slice(&1500u16.to_be_bytes());
    assert_eq!(tunnel.process(&mut overlong), Verdict::Drop(DropReason::Malformed));

    assert_eq!(tunnel.stats().malformed(), 3);
    assert_eq!(tunnel.rules().get(0).unwrap().quota().count(), 0);
}

#[tokio::test]
async fn run_forwards_admitted_packets_until_device_closes() {
    let (device, mut handle) = MemoryDevice::pair("mem0");
    assert_eq!(device.name(), "mem0");

    let rules = RuleSet::new(vec![rule("93.184.216.0/24", "1kb")]);
    let mut tunnel = Tunnel::new(device, rules, TunnelConfig::default());
    let stats = tunnel.stats().clone();

    let task = tokio::spawn(async move { tunnel.run().await });

    let remote = Ipv4Addr::new(93, 184, 216, 34);
    handle.inject(data(INWARD, Ipv4Addr::new(9, 9, 9, 9))).await.unwrap();
    handle.inject(packet(Protocol::UDP, INWARD, remote, 1000)).await.unwrap();
    handle.inject(packet(Protocol::UDP, INWARD, remote, 100)).await.unwrap();
    handle.inject(packet(Protocol::UDP, INWARD, remote, 100)).await.unwrap();

    for len in [1000, 100] {
        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent.len(), len);
        assert_eq!(source(&sent), OUTWARD);
    }

    drop(handle);
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, TunnelError::Read(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));

    assert_eq!(stats.read(), 4);
    assert_eq!(stats.forwarded(), 2);
    assert_eq!(stats.unmatched(), 1);
    assert_eq!(stats.denied(), 1);
}
