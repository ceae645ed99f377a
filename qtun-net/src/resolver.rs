use std::{io, net::IpAddr};

use qtun_rules::Resolver;

/// Resolves names with the system resolver (`getaddrinfo`), off the async workers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        let addrs: Vec<IpAddr> =
            tokio::net::lookup_host((name, 0)).await?.map(|addr| addr.ip()).collect();

        tracing::debug!(name, ?addrs, "resolved");
        Ok(addrs)
    }
}
