use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use qtun_rules::{load, load_file, Error, LimitError, LimitKind, Matcher, Resolver};

/// Resolves names from a fixed table.
#[derive(Default)]
struct StaticResolver(HashMap<&'static str, Vec<IpAddr>>);

impl StaticResolver {
    fn with(mut self, name: &'static str, addrs: &[IpAddr]) -> Self {
        self.0.insert(name, addrs.to_vec());
        self
    }
}

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        self.0.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such host: {name}"))
        })
    }
}

fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[tokio::test]
async fn loads_rules_in_declaration_order() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = StaticResolver::default()
        .with("example.com", &[v4(93, 184, 216, 34), IpAddr::V6(Ipv6Addr::LOCALHOST)]);
    let source = "0.0.0.0/0 1gb\nexample.com 30m\n10.8.1.7/16 250mb\n";

    let rules = load(source, &resolver).await.unwrap();
    assert_eq!(rules.len(), 3);

    let labels: Vec<_> = rules.iter().map(|rule| rule.label()).collect();
    assert_eq!(labels, ["0.0.0.0/0", "example.com", "10.8.0.0/16"]);

    let domain = rules.get(1).unwrap();
    assert_eq!(domain.kind(), LimitKind::Time);
    assert_eq!(domain.limit().base(), 30 * 60);
    assert_eq!(
        domain.matcher(),
        &Matcher::Addresses([Ipv4Addr::new(93, 184, 216, 34)].into_iter().collect())
    );

    let cidr = rules.get(2).unwrap();
    assert_eq!(cidr.kind(), LimitKind::Data);
    assert_eq!(cidr.quota().limit(), 250 * 1024 * 1024);
    assert_eq!(cidr.quota().count(), 0);
}

#[tokio::test]
async fn skips_short_and_comment_lines() {
    let source = "\n# a comment\nlonely\n10.0.0.0/8 1kb\r\n   \n";
    let rules = load(source, &StaticResolver::default()).await.unwrap();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules.get(0).unwrap().limit().base(), 1024);
}

#[tokio::test]
async fn bare_address_is_an_exact_match() {
    let rules = load("1.1.1.1 5s", &StaticResolver::default()).await.unwrap();
    let rule = rules.get(0).unwrap();

    assert_eq!(rule.label(), "1.1.1.1");
    assert!(rule.matches(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(10, 0, 0, 2)));
    assert!(!rule.matches(Ipv4Addr::new(1, 1, 1, 2), Ipv4Addr::new(10, 0, 0, 2)));
}

#[tokio::test]
async fn later_lines_take_priority() {
    let source = "10.0.0.0/8 1gb\n10.1.0.0/16 1mb\n";
    let rules = load(source, &StaticResolver::default()).await.unwrap();

    let (index, rule) =
        rules.find_match(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(10, 0, 0, 2)).unwrap();
    assert_eq!(index, 1);
    assert_eq!(rule.label(), "10.1.0.0/16");
}

#[tokio::test]
async fn unresolvable_target_fails_the_load() {
    let source = "10.0.0.0/8 1gb\nno-such-host.invalid 1mb\n";
    let err = load(source, &StaticResolver::default()).await.unwrap_err();

    match err {
        Error::Target { line, target, .. } => {
            assert_eq!(line, 2);
            assert_eq!(target, "no-such-host.invalid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_unit_fails_the_load() {
    let err = load("10.0.0.0/8 5tb", &StaticResolver::default()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Limit { line: 1, source: LimitError::UnsupportedUnit(ref unit) } if unit == "tb"
    ));
}

#[tokio::test]
async fn domain_without_ipv4_never_matches() {
    let resolver =
        StaticResolver::default().with("v6.example", &[IpAddr::V6(Ipv6Addr::LOCALHOST)]);
    let rules = load("v6.example 1mb", &resolver).await.unwrap();

    assert!(rules.find_match(Ipv4Addr::LOCALHOST, Ipv4Addr::UNSPECIFIED).is_none());
}

#[tokio::test]
async fn missing_file_is_a_read_error() {
    let err = load_file("/nonexistent/qtun/rules.txt", &StaticResolver::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Read { .. }));
}
