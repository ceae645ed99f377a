//! Rule-set loading.
//!
//! A rule set is plain text with one rule per line, fields separated by a single space:
//!
//! ```text
//! # everything else
//! 0.0.0.0/0 1gb
//! example.com 30m
//! 10.8.0.0/16 250mb
//! ```
//!
//! The target is a CIDR block, a bare IPv4 address or a domain name, which is resolved once
//! while loading. Blank lines, lines with fewer than two fields and lines starting with `#`
//! are skipped.
//! Any line that cannot be turned into a rule fails the whole load.

use std::{
    io,
    net::{IpAddr, Ipv4Addr},
    path::Path,
};

use ipnet::Ipv4Net;
use rustc_hash::FxHashSet;

use crate::{
    limit::Limit,
    rule::{Matcher, Rule, RuleSet},
    Error, Result,
};

/// Resolves domain names to addresses. Called once per domain rule at load time.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>>;
}

/// Reads and parses the rule set at `path`.
pub async fn load_file<R>(path: impl AsRef<Path>, resolver: &R) -> Result<RuleSet>
where
    R: Resolver + ?Sized,
{
    let path = path.as_ref();
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Read { path: path.to_path_buf(), source })?;

    let rules = load(&source, resolver).await?;
    tracing::info!("Parsed {} rules from {}", rules.len(), path.display());

    Ok(rules)
}

/// Parses a rule set, preserving the order of its lines.
pub async fn load<R>(source: &str, resolver: &R) -> Result<RuleSet>
where
    R: Resolver + ?Sized,
{
    let mut rules = Vec::new();

    for (index, line) in source.split('\n').enumerate() {
        let line_no = index + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = line.split(' ');
        let (Some(target), Some(limit)) = (fields.next(), fields.next()) else {
            continue;
        };

        let (matcher, label) = parse_target(target, line_no, resolver).await?;
        let limit = Limit::parse(limit).map_err(|source| Error::Limit { line: line_no, source })?;

        rules.push(Rule::new(matcher, label, limit));
    }

    for (index, rule) in rules.iter().enumerate() {
        match rule.matcher() {
            Matcher::Addresses(addrs) => {
                tracing::info!("#{index} {} {:?} {}", rule.label(), addrs, rule.limit());
            }
            _ => tracing::info!("#{index} {} {}", rule.label(), rule.limit()),
        }
    }

    Ok(RuleSet::new(rules))
}

async fn parse_target<R>(target: &str, line: usize, resolver: &R) -> Result<(Matcher, String)>
where
    R: Resolver + ?Sized,
{
    if let Ok(net) = target.parse::<Ipv4Net>() {
        let net = net.trunc();
        return Ok((Matcher::Cidr(net), net.to_string()));
    }

    if let Ok(addr) = target.parse::<Ipv4Addr>() {
        let addrs = FxHashSet::from_iter([addr]);
        return Ok((Matcher::Addresses(addrs), target.to_owned()));
    }

    let resolved = resolver.resolve(target).await.map_err(|source| Error::Target {
        line,
        target: target.to_owned(),
        source,
    })?;

    let addrs: FxHashSet<Ipv4Addr> = resolved
        .into_iter()
        .filter_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        })
        .collect();

    if addrs.is_empty() {
        tracing::warn!(line, target, "domain has no IPv4 addresses, the rule will never match");
    }

    Ok((Matcher::Addresses(addrs), target.to_owned()))
}
