//! Keeps a dynamic DNS record pointed at the host's public address.
//!
//! A [`DdnsAgent`] asks an IP-echo service for the current public address,
//! compares it with the last address it announced, and only when the two
//! differ sends an update request to the DDNS provider. All network traffic
//! goes through the small [`Transport`] trait, so the same logic runs over a
//! std `TcpStream` (feature `tcp`) or over whatever socket an embedded board
//! offers.

pub mod agent;
pub mod config;
pub mod http;
pub mod ip;
pub mod services;
pub mod transport;
mod util;

pub use agent::{DdnsAgent, DdnsResult, UpdateError};
pub use ip::{resolve_public_address, AddressFormat, ResolveError, Resolver};
pub use services::{DdnsService, DdnsUpdateError};
pub use transport::{ConnectError, Connector, PollConfig, RetryPolicy, Session, Transport};

#[cfg(feature = "tcp")]
pub use transport::{TcpConnector, TcpTransport};
