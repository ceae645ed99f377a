//! Wire-level building blocks of the tunnel: zero-copy IPv4/TCP header views, incremental
//! one's-complement checksum updates and the endpoint address translator.

pub mod checksum;
pub mod header;
pub mod translate;

pub use header::{HeaderError, Ipv4View, Protocol, TcpView, MAX_PACKET_SIZE};
pub use translate::{translate, Translation};
