use std::{net::Ipv4Addr, sync::Arc};

use qtun_device::Device;
use qtun_rules::{Admission, LimitKind, Rule, RuleSet};
use qtun_wire::{translate, Ipv4View, Protocol, Translation, MAX_PACKET_SIZE};
use tracing::Instrument;

use crate::{
    status::{NoopSink, StatusEvent, StatusSink},
    TunnelConfig, TunnelError, TunnelStats,
};

/// Why a packet was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The buffer is not a well-formed IPv4 datagram.
    Malformed,
    /// No rule matched and the packet is not UDP.
    Unmatched,
    /// The matching rule's quota is used up.
    LimitReached,
    /// The matching rule counts time, which only TCP and ICMP packets are admitted against.
    Unsupported,
}

/// The decision taken for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The packet was translated in place and must be written back to the device.
    Forward(Translation),
    Drop(DropReason),
}

impl Verdict {
    #[inline]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Forward(_))
    }
}

/// Header fields the decision depends on, copied out so the buffer can be rewritten
/// afterwards.
#[derive(Debug, Clone, Copy)]
struct Summary {
    source: Ipv4Addr,
    destination: Ipv4Addr,
    protocol: Protocol,
}

impl Summary {
    fn read(packet: &[u8]) -> Option<Self> {
        let view = match Ipv4View::parse(packet) {
            Ok(view) => view,
            Err(e) => {
                tracing::trace!(len = packet.len(), "dropping malformed packet: {e}");
                return None;
            }
        };

        Some(Self {
            source: view.source(),
            destination: view.destination(),
            protocol: view.protocol(),
        })
    }
}

/// Decodes the TCP header of an already validated packet. A segment too short to hold a TCP
/// header is not a handshake reply.
fn is_syn_ack(packet: &[u8]) -> bool {
    Ipv4View::parse(packet).ok().and_then(|view| view.tcp()).is_some_and(|tcp| tcp.is_syn_ack())
}

/// The dispatch loop of a tunnel: reads packets from a [`Device`], charges them against the
/// matching rule and writes admitted packets back with their endpoint address translated.
///
/// Packets are handled strictly one at a time in arrival order. The only concurrent work is
/// the per-second timer of each running time quota, which lives on the Tokio runtime.
pub struct Tunnel<D, S = NoopSink> {
    device: D,
    rules: RuleSet,
    config: TunnelConfig,
    sink: S,
    stats: Arc<TunnelStats>,
}

impl<D: Device> Tunnel<D> {
    pub fn new(device: D, rules: RuleSet, config: TunnelConfig) -> Self {
        Self { device, rules, config, sink: NoopSink, stats: Arc::default() }
    }
}

impl<D, S> Tunnel<D, S>
where
    D: Device,
    S: StatusSink,
{
    /// Replaces the status sink.
    pub fn with_sink<T: StatusSink>(self, sink: T) -> Tunnel<D, T> {
        Tunnel {
            device: self.device,
            rules: self.rules,
            config: self.config,
            sink,
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> &Arc<TunnelStats> {
        &self.stats
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decides the fate of one packet. Admitted packets are translated in place.
    ///
    /// Starting a time quota's timer spawns a task, so this must run inside a Tokio runtime.
    pub fn process(&self, packet: &mut [u8]) -> Verdict {
        let verdict = self.decide(packet);
        self.stats.record(verdict);
        verdict
    }

    fn decide(&self, packet: &mut [u8]) -> Verdict {
        let Some(summary) = Summary::read(packet) else {
            return Verdict::Drop(DropReason::Malformed);
        };

        let Some((index, rule)) = self.rules.find_match(summary.source, summary.destination)
        else {
            if summary.protocol == Protocol::UDP {
                tracing::trace!(src = %summary.source, dst = %summary.destination, "forwarding unmatched UDP packet");
                return Verdict::Forward(self.translate(packet));
            }

            tracing::trace!(
                src = %summary.source,
                dst = %summary.destination,
                protocol = ?summary.protocol,
                "dropping unmatched packet"
            );
            return Verdict::Drop(DropReason::Unmatched);
        };

        let quota = rule.quota();
        let admission = match rule.kind() {
            LimitKind::Data => quota.admit_data(packet.len() as u64),
            LimitKind::Time => match summary.protocol {
                Protocol::TCP => {
                    if is_syn_ack(packet) && quota.start_timer() {
                        tracing::debug!(rule = index, label = rule.label(), "connection established, timer started");
                    }
                    quota.admit_time()
                }
                Protocol::ICMP => quota.admit_time(),
                protocol => {
                    tracing::trace!(rule = index, ?protocol, "dropping packet under time rule");
                    return Verdict::Drop(DropReason::Unsupported);
                }
            },
        };

        match admission {
            Admission::Admitted(count) => {
                self.emit_forwarded(index, rule, count);
                Verdict::Forward(self.translate(packet))
            }
            Admission::Denied(_) => {
                self.sink.emit(StatusEvent::LimitReached {
                    rule: index,
                    label: Arc::clone(rule.shared_label()),
                    kind: rule.kind(),
                    limit: quota.limit(),
                });
                Verdict::Drop(DropReason::LimitReached)
            }
        }
    }

    fn emit_forwarded(&self, index: usize, rule: &Rule, count: u64) {
        self.sink.emit(StatusEvent::Forwarded {
            rule: index,
            label: Arc::clone(rule.shared_label()),
            kind: rule.kind(),
            count,
            limit: rule.quota().limit(),
        });
    }

    #[inline]
    fn translate(&self, packet: &mut [u8]) -> Translation {
        translate(packet, self.config.inward, self.config.outward)
    }

    /// Runs the dispatch loop until the device fails. Interface errors are not recoverable,
    /// so this only ever returns an error.
    pub async fn run(&mut self) -> Result<(), TunnelError> {
        let span = tracing::info_span!("tunnel", iface = %self.device.name());
        self.dispatch().instrument(span).await
    }

    async fn dispatch(&mut self) -> Result<(), TunnelError> {
        tracing::info!(rules = self.rules.len(), inward = %self.config.inward, outward = %self.config.outward, "tunnel running");

        let mut buf = [0u8; MAX_PACKET_SIZE];
        loop {
            let len = self.device.recv(&mut buf).await.map_err(TunnelError::Read)?;
            self.stats.increment_read();

            let packet = &mut buf[..len];
            if self.process(packet).is_forward() {
                self.device.send(packet).await.map_err(TunnelError::Write)?;
            }
        }
    }
}

impl<D, S> std::fmt::Debug for Tunnel<D, S>
where
    D: Device,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("device", &self.device.name())
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}
