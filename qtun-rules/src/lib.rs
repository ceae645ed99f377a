//! Rules and quotas of the tunnel.
//!
//! A [`RuleSet`] is loaded once at startup with [`load`] or [`load_file`] and never changes
//! shape afterwards. Each [`Rule`] owns a [`Quota`] whose counter is advanced by the dispatch
//! loop (data quotas) or by a per-rule timer task (time quotas).

use std::{io, path::PathBuf};

use thiserror::Error;

pub mod limit;
pub mod loader;
pub mod quota;
pub mod rule;

pub use limit::{Limit, LimitError, LimitKind, Unit};
pub use loader::{load, load_file, Resolver};
pub use quota::{Admission, Quota};
pub use rule::{Matcher, Rule, RuleSet};

/// Configuration errors. Any of these prevents the tunnel from starting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read rule set {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {target:?} is neither a valid CIDR block nor a resolvable domain name: {source}")]
    Target {
        line: usize,
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {source}")]
    Limit {
        line: usize,
        #[source]
        source: LimitError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
