use std::{net::Ipv4Addr, sync::Arc};

use ipnet::Ipv4Net;
use rustc_hash::FxHashSet;

use crate::{
    limit::{Limit, LimitKind},
    quota::Quota,
};

/// Which packets a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Every address inside a CIDR block.
    Cidr(Ipv4Net),
    /// An explicit set of addresses, usually resolved from a domain name at load time.
    Addresses(FxHashSet<Ipv4Addr>),
    /// Every address.
    Any,
}

impl Matcher {
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        match self {
            Self::Cidr(net) => net.contains(&addr),
            Self::Addresses(set) => set.contains(&addr),
            Self::Any => true,
        }
    }
}

/// One admission policy: a matcher, a limit and the quota counting against it.
#[derive(Debug)]
pub struct Rule {
    matcher: Matcher,
    /// The CIDR block, address or domain name the rule was written with.
    label: Arc<str>,
    limit: Limit,
    quota: Arc<Quota>,
}

impl Rule {
    pub fn new(matcher: Matcher, label: impl Into<Arc<str>>, limit: Limit) -> Self {
        let quota = Arc::new(Quota::new(limit.base()));
        Self { matcher, label: label.into(), limit, quota }
    }

    /// A packet matches if either its source or its destination is covered by the matcher.
    #[inline]
    pub fn matches(&self, src: Ipv4Addr, dst: Ipv4Addr) -> bool {
        self.matcher.contains(src) || self.matcher.contains(dst)
    }

    #[inline]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The label as a shared string, cheap to hand out with every status event.
    #[inline]
    pub const fn shared_label(&self) -> &Arc<str> {
        &self.label
    }

    #[inline]
    pub const fn limit(&self) -> &Limit {
        &self.limit
    }

    #[inline]
    pub const fn kind(&self) -> LimitKind {
        self.limit.kind()
    }

    #[inline]
    pub const fn quota(&self) -> &Arc<Quota> {
        &self.quota
    }
}

/// The ordered rules of a tunnel. Later rules take priority over earlier ones.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub const fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Returns the last declared rule matching the packet, with its index.
    pub fn find_match(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Option<(usize, &Rule)> {
        self.rules.iter().enumerate().rev().find(|(_, rule)| rule.matches(src, dst))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
