//! Host configuration around the tunnel interface.
//!
//! Once the interface exists, the host has to address it, forward IP traffic through it and
//! masquerade the tunnel's outward address on the way out. Everything done by
//! [`Plan::setup`] is reversed by [`Plan::teardown`], in the opposite order.
//!
//! ## Linux
//! Traffic is steered into the interface with a dedicated routing table (default `Tun`,
//! which must be declared in `/etc/iproute2/rt_tables`). Packets leaving from the outward
//! address bypass that table and are masqueraded on the egress interface with `iptables`.
//!
//! ## macOS
//! The interface is configured point-to-point and both halves of the address space are
//! routed through it.

use std::{net::Ipv4Addr, process::Command};

use crate::{command::Runner, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
}

impl Platform {
    /// The platform this binary was built for, if supported.
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else {
            None
        }
    }
}

/// Addresses and names used to wire the tunnel into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Address of the interface; packets from the host carry it as their source.
    pub inward: Ipv4Addr,
    /// Address the translated traffic is presented with.
    pub outward: Ipv4Addr,
    /// Outgoing interface used for masquerading (Linux only).
    pub egress: String,
    /// Name of the routing table steering traffic into the tunnel (Linux only).
    pub table: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            inward: Ipv4Addr::new(10, 0, 0, 1),
            outward: Ipv4Addr::new(10, 0, 0, 2),
            egress: "enp0s3".to_string(),
            table: "Tun".to_string(),
        }
    }
}

/// An ordered list of commands changing the host configuration.
#[derive(Debug)]
pub struct Plan {
    commands: Vec<Command>,
}

impl Plan {
    /// Builds the commands configuring `iface`.
    pub fn setup(platform: Platform, iface: &str, config: &SetupConfig) -> Self {
        let inward = config.inward.to_string();
        let outward = config.outward.to_string();
        let subnet = format!("{inward}/30");

        let commands = match platform {
            Platform::Linux => vec![
                cmd("/sbin/ifconfig", &[iface, "inet", &subnet, "up"]),
                cmd("/sbin/sysctl", &["-w", "net.ipv4.ip_forward=1"]),
                cmd("/sbin/ip", &["route", "add", "default", "dev", iface, "table", &config.table]),
                cmd("/sbin/ip", &["rule", "add", "from", "all", "lookup", &config.table]),
                cmd("/sbin/ip", &["rule", "add", "from", &outward, "lookup", "main", "priority", "500"]),
                cmd(
                    "/sbin/iptables",
                    &["-t", "nat", "-A", "POSTROUTING", "-o", &config.egress, "-s", &outward, "-j", "MASQUERADE"],
                ),
            ],
            Platform::MacOs => vec![
                cmd("/sbin/ifconfig", &[iface, &subnet, &outward, "up"]),
                cmd("/usr/sbin/sysctl", &["-w", "net.inet.ip.forwarding=1"]),
                cmd("/sbin/route", &["add", &subnet, &outward]),
                cmd("/sbin/route", &["add", "128.0/1", &outward]),
                cmd("/sbin/route", &["add", "0.0.0.0/1", &outward]),
            ],
        };

        Self { commands }
    }

    /// Builds the commands undoing [`Plan::setup`].
    pub fn teardown(platform: Platform, iface: &str, config: &SetupConfig) -> Self {
        let inward = config.inward.to_string();
        let outward = config.outward.to_string();
        let subnet = format!("{inward}/30");

        let commands = match platform {
            Platform::Linux => vec![
                cmd(
                    "/sbin/iptables",
                    &["-t", "nat", "-D", "POSTROUTING", "-o", &config.egress, "-s", &outward, "-j", "MASQUERADE"],
                ),
                cmd("/sbin/ip", &["rule", "del", "from", &outward, "lookup", "main"]),
                cmd("/sbin/ip", &["rule", "del", "from", "all", "lookup", &config.table]),
                cmd("/sbin/ip", &["route", "del", "default", "dev", iface, "table", &config.table]),
                cmd("/sbin/sysctl", &["-w", "net.ipv4.ip_forward=0"]),
                cmd("/sbin/ifconfig", &[iface, "down"]),
            ],
            Platform::MacOs => vec![
                cmd("/sbin/route", &["delete", "0.0.0.0/1", &outward]),
                cmd("/sbin/route", &["delete", "128.0/1", &outward]),
                cmd("/sbin/route", &["delete", &subnet, &outward]),
                cmd("/usr/sbin/sysctl", &["-w", "net.inet.ip.forwarding=0"]),
                cmd("/sbin/ifconfig", &[iface, "delete"]),
            ],
        };

        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Runs the commands in order and stops at the first failure.
    pub fn execute(mut self) -> Result<()> {
        for cmd in &mut self.commands {
            Runner::run(cmd)?;
        }

        Ok(())
    }

    /// Runs every command even if some fail, which makes undoing a partial setup safe.
    /// Returns the first failure, if any.
    pub fn execute_all(mut self) -> Result<()> {
        let mut first = None;
        for cmd in &mut self.commands {
            if let Err(e) = Runner::run(cmd) {
                tracing::warn!("{e}");
                first.get_or_insert(e);
            }
        }

        first.map_or(Ok(()), |e| Err(e.into()))
    }
}

/// Host configuration applied to a tunnel interface. Call [`HostSetup::teardown`] before the
/// process exits.
#[derive(Debug)]
pub struct HostSetup {
    platform: Platform,
    iface: String,
    config: SetupConfig,
}

impl HostSetup {
    /// Configures the host for `iface`. On failure, whatever was already applied is undone.
    pub fn apply(iface: &str, config: SetupConfig) -> Result<Self> {
        let platform = Platform::current().ok_or(Error::UnsupportedPlatform)?;
        tracing::info!(iface, ?platform, "setting up interface");

        let setup = Self { platform, iface: iface.to_owned(), config };
        if let Err(e) = Plan::setup(platform, iface, &setup.config).execute() {
            if let Err(undo) = setup.teardown() {
                tracing::debug!("while undoing partial setup: {undo}");
            }
            return Err(e);
        }

        Ok(setup)
    }

    /// Reverts the host configuration. Every step is attempted, so this is safe to call after
    /// a partial setup or a previous teardown.
    pub fn teardown(&self) -> Result<()> {
        tracing::info!(iface = %self.iface, "tearing down interface");
        Plan::teardown(self.platform, &self.iface, &self.config).execute_all()
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }
}

fn cmd(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}
