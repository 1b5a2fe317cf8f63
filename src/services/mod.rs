pub mod duckdns;
pub mod namecheap;

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

use crate::transport::ConnectError;

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum DdnsUpdateError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("{0} did not accept the whole update request")]
    Send(&'static str),
}

/// A DDNS provider reachable with a single plain-HTTP GET.
///
/// Services only describe the request. Connecting, sending and draining the
/// reply is done by the [`DdnsAgent`](crate::agent::DdnsAgent), and the reply
/// is never interpreted: once the provider has the request, the update counts
/// as delivered. `Debug` output must not reveal credentials.
pub trait DdnsService: fmt::Debug {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Host serving the update endpoint.
    fn host(&self) -> &str;

    fn port(&self) -> u16 {
        80
    }

    /// The complete request that points the record at `address`.
    fn update_request(&self, address: &IpAddr) -> String;
}

impl<S: DdnsService + ?Sized> DdnsService for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn host(&self) -> &str {
        (**self).host()
    }

    fn port(&self) -> u16 {
        (**self).port()
    }

    fn update_request(&self, address: &IpAddr) -> String {
        (**self).update_request(address)
    }
}
