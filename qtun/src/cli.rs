use std::{net::Ipv4Addr, path::PathBuf};

use clap::Parser;
use qtun_net::SetupConfig;
use qtun_tunnel::TunnelConfig;

use crate::Error;

/// Forward the traffic of a TUN interface under per-destination data and time quotas.
#[derive(Debug, Clone, Parser)]
#[command(name = "qtun", version, about)]
pub struct Args {
    /// Rule-set file, one `<target> <limit>` rule per line. Later rules take priority.
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Address of the TUN interface.
    #[arg(long, default_value_t = Ipv4Addr::new(10, 0, 0, 1))]
    pub inward: Ipv4Addr,

    /// Address the forwarded traffic is presented with.
    #[arg(long, default_value_t = Ipv4Addr::new(10, 0, 0, 2))]
    pub outward: Ipv4Addr,

    /// Outgoing interface the outward address is masqueraded on (Linux).
    #[arg(long, default_value = "enp0s3")]
    pub egress: String,

    /// Routing table steering traffic into the tunnel (Linux). Must exist in
    /// `/etc/iproute2/rt_tables`.
    #[arg(long, default_value = "Tun")]
    pub table: String,

    /// Leave routes, forwarding and NAT alone. The interface has to be configured by hand.
    #[arg(long)]
    pub skip_setup: bool,

    /// Do not print the status line.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn validate(&self) -> Result<(), Error> {
        if self.inward == self.outward {
            return Err(Error::Config(format!(
                "inward and outward addresses must differ, both are {}",
                self.inward
            )));
        }

        Ok(())
    }

    pub const fn tunnel_config(&self) -> TunnelConfig {
        TunnelConfig { inward: self.inward, outward: self.outward }
    }

    pub fn setup_config(&self) -> SetupConfig {
        SetupConfig {
            inward: self.inward,
            outward: self.outward,
            egress: self.egress.clone(),
            table: self.table.clone(),
        }
    }
}
