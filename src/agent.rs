use std::net::IpAddr;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ip::{ResolveError, Resolver};
use crate::services::{namecheap, DdnsService, DdnsUpdateError};
use crate::transport::{Connector, PollConfig, Received, RetryPolicy, Session, Transport};

/// Outcome of one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdnsResult {
    Error,
    Updated,
    Unchanged,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("unable to resolve the public address: {0}")]
    Resolve(#[from] ResolveError),

    #[error("unable to notify the provider: {0}")]
    Provider(#[from] DdnsUpdateError),
}

/// Keeps one DDNS record pointed at this host's public address.
///
/// The agent remembers the last address it successfully announced. A cycle
/// only talks to the provider when the resolved address differs from it, and
/// the remembered address only moves once the provider has received the
/// request. A failed cycle leaves it untouched, so the next cycle retries.
#[derive(Debug)]
pub struct DdnsAgent<S = Box<dyn DdnsService>> {
    service: S,
    resolver: Resolver,
    retry: RetryPolicy,
    poll: PollConfig,
    last_addr: Option<IpAddr>,
}

impl DdnsAgent<namecheap::Service> {
    /// Agent for the bare domain (`@`) of a Namecheap-hosted zone.
    pub fn namecheap(domain: impl Into<Box<str>>, password: impl Into<Box<str>>) -> Self {
        Self::new(namecheap::Service::new(domain, password))
    }
}

impl<S: DdnsService> DdnsAgent<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            resolver: Resolver::default(),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
            last_addr: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Connect retries used for the provider request.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read pacing used while draining the provider's reply.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Start from an address known to be published already.
    pub fn with_last_address(mut self, address: IpAddr) -> Self {
        self.last_addr = Some(address);
        self
    }

    pub fn last_address(&self) -> Option<IpAddr> {
        self.last_addr
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Run one update cycle. Every transport taken from `connector` has been
    /// stopped by the time this returns.
    pub fn update<C: Connector>(&mut self, connector: &mut C) -> DdnsResult {
        match self.try_update(connector) {
            Ok(result) => result,
            Err(e) => {
                warn!(service = self.service.name(), "update cycle failed: {}", e);
                DdnsResult::Error
            }
        }
    }

    /// Like [`update`](Self::update), but hands back the reason a cycle failed.
    pub fn try_update<C: Connector>(&mut self, connector: &mut C) -> Result<DdnsResult, UpdateError> {
        let address = self.resolver.resolve(connector.open())?;

        if self.last_addr == Some(address) {
            debug!(service = self.service.name(), %address, "public address unchanged");
            return Ok(DdnsResult::Unchanged);
        }

        info!(
            service = self.service.name(),
            previous = ?self.last_addr,
            current = %address,
            "public address changed, notifying provider"
        );

        self.notify(connector.open(), &address)?;
        self.last_addr = Some(address);

        info!(service = self.service.name(), %address, "record updated");
        Ok(DdnsResult::Updated)
    }

    fn notify<T: Transport>(&self, transport: T, address: &IpAddr) -> Result<(), DdnsUpdateError> {
        let mut session = Session::new(transport);
        session.connect(self.service.host(), self.service.port(), &self.retry)?;

        if !session.send(&self.service.update_request(address)) {
            return Err(DdnsUpdateError::Send(self.service.name()));
        }

        // The reply is drained so the provider sees an orderly close, but its
        // content is not interpreted.
        match session.read_to_close(&self.poll) {
            Received::Closed(reply) | Received::Overflow(reply) => {
                debug!(service = self.service.name(), bytes = reply.len(), "provider closed the connection");
            }
            Received::TimedOut(reply) => {
                warn!(
                    service = self.service.name(),
                    bytes = reply.len(),
                    "provider kept the connection open, reply discarded"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use super::*;
    use crate::transport::fake::{FakeConnector, Script};
    use crate::transport::MAX_RESPONSE_LEN;

    const ECHO_REPLY: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n203.0.113.7";
    const PROVIDER_REPLY: &str = "HTTP/1.1 200 OK\r\n\r\n<?xml version=\"1.0\"?><interface-response/>";

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: NonZeroU32::new(2).unwrap(),
            delay: Duration::ZERO,
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(2),
        }
    }

    fn agent() -> DdnsAgent<namecheap::Service> {
        DdnsAgent::namecheap("example.com", "secret")
            .with_resolver(
                Resolver::new("echo.test")
                    .with_retry(fast_retry())
                    .with_poll(fast_poll()),
            )
            .with_retry(fast_retry())
            .with_poll(fast_poll())
    }

    fn addr(text: &str) -> IpAddr {
        text.parse().unwrap()
    }

    fn assert_all_stopped_once(connector: &FakeConnector) {
        for i in 0..connector.opened() {
            assert_eq!(connector.record(i).stops, 1, "transport {} stop count", i);
        }
    }

    #[test]
    fn first_cycle_updates_from_unset() {
        let mut agent = agent();
        let mut connector =
            FakeConnector::new([Script::respond(ECHO_REPLY), Script::respond(PROVIDER_REPLY)]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_eq!(agent.last_address(), Some(addr("203.0.113.7")));
        assert_eq!(connector.opened(), 2);

        let provider = connector.record(1);
        assert_eq!(
            provider.connects,
            [(namecheap::UPDATE_HOST.to_owned(), 80)]
        );
        assert_eq!(
            provider.written(),
            namecheap::build_update_request("example.com", "@", "secret", &addr("203.0.113.7"))
        );
        drop(provider);

        assert_all_stopped_once(&connector);
    }

    #[test]
    fn same_address_is_unchanged_without_provider_call() {
        let mut agent = agent().with_last_address(addr("203.0.113.7"));
        let mut connector =
            FakeConnector::new([Script::respond(ECHO_REPLY), Script::respond(PROVIDER_REPLY)]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Unchanged);
        assert_eq!(connector.opened(), 1);
        assert_eq!(agent.last_address(), Some(addr("203.0.113.7")));
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn second_cycle_with_same_address_is_unchanged() {
        let mut agent = agent();
        let mut connector = FakeConnector::new([
            Script::respond(ECHO_REPLY),
            Script::respond(PROVIDER_REPLY),
            Script::respond("203.0.113.7\n"),
        ]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_eq!(agent.update(&mut connector), DdnsResult::Unchanged);
        assert_eq!(connector.opened(), 3);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn changed_address_makes_exactly_one_provider_request() {
        let mut agent = agent().with_last_address(addr("198.51.100.1"));
        let mut connector =
            FakeConnector::new([Script::respond(ECHO_REPLY), Script::respond(PROVIDER_REPLY)]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.record(1).connects.len(), 1);
        assert_eq!(agent.last_address(), Some(addr("203.0.113.7")));
    }

    #[test]
    fn resolver_failure_is_error_and_keeps_cache() {
        let mut agent = agent().with_last_address(addr("198.51.100.1"));
        let mut connector = FakeConnector::new([Script::refuse()]);

        assert_eq!(
            agent.try_update(&mut connector),
            Err(UpdateError::Resolve(ResolveError::Connect(
                crate::transport::ConnectError {
                    host: "echo.test".into(),
                    port: 80,
                    attempts: 2,
                }
            )))
        );
        assert_eq!(agent.last_address(), Some(addr("198.51.100.1")));
        assert_eq!(connector.opened(), 1);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn provider_failure_is_error_and_keeps_cache() {
        let mut agent = agent().with_last_address(addr("198.51.100.1"));
        let mut connector = FakeConnector::new([Script::respond(ECHO_REPLY), Script::refuse()]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Error);
        assert_eq!(agent.last_address(), Some(addr("198.51.100.1")));
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.record(1).connects.len(), 2);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn provider_failure_is_retried_next_cycle() {
        let mut agent = agent();
        let mut connector = FakeConnector::new([
            Script::respond(ECHO_REPLY),
            Script::refuse(),
            Script::respond(ECHO_REPLY),
            Script::respond(PROVIDER_REPLY),
        ]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Error);
        assert_eq!(agent.last_address(), None);
        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_eq!(agent.last_address(), Some(addr("203.0.113.7")));
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn short_write_to_provider_is_error() {
        let mut agent = agent();
        let mut connector = FakeConnector::new([
            Script::respond(ECHO_REPLY),
            Script::respond(PROVIDER_REPLY).write_limit(10),
        ]);

        assert_eq!(
            agent.try_update(&mut connector),
            Err(UpdateError::Provider(DdnsUpdateError::Send("Namecheap")))
        );
        assert_eq!(agent.last_address(), None);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn provider_disconnecting_mid_reply_still_counts() {
        let mut agent = agent();
        let mut connector = FakeConnector::new([
            Script::respond(ECHO_REPLY),
            Script::respond("HTTP/1.1 200 OK\r\nContent-Len").chunked(5),
        ]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn oversized_echo_reply_is_error_without_provider_call() {
        let head = "HTTP/1.1 200 OK\r\n\r\n";
        let tail = "203.0.113.70\n";
        let padding = "x".repeat(MAX_RESPONSE_LEN - head.len() - tail.len() + 1);
        let page = format!("{}{}\n{}", head, padding, tail);

        let mut agent = agent();
        let mut connector =
            FakeConnector::new([Script::respond(&page), Script::respond(PROVIDER_REPLY)]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Error);
        assert_eq!(agent.last_address(), None);
        assert_eq!(connector.opened(), 1);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn oversized_provider_reply_still_counts() {
        let reply = "z".repeat(MAX_RESPONSE_LEN * 2);
        let mut agent = agent();
        let mut connector =
            FakeConnector::new([Script::respond(ECHO_REPLY), Script::respond(&reply)]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn hanging_provider_is_stopped() {
        let mut agent = agent().with_poll(PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        });
        let mut connector = FakeConnector::new([
            Script::respond(ECHO_REPLY),
            Script::respond(PROVIDER_REPLY).hanging(),
        ]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert_all_stopped_once(&connector);
    }

    #[test]
    fn debug_output_hides_the_password() {
        let service: Box<dyn DdnsService> = Box::new(namecheap::Service::new("example.com", "hunter2"));
        let text = format!("{:?}", DdnsAgent::new(service));

        assert!(text.contains("example.com"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn boxed_services_work() {
        let service: Box<dyn DdnsService> = Box::new(namecheap::Service::new("example.com", "secret").with_host("www"));
        let mut agent = DdnsAgent::new(service).with_resolver(
            Resolver::new("echo.test")
                .with_retry(fast_retry())
                .with_poll(fast_poll()),
        );
        let mut connector =
            FakeConnector::new([Script::respond("192.0.2.8\n"), Script::respond("")]);

        assert_eq!(agent.update(&mut connector), DdnsResult::Updated);
        assert!(connector.record(1).written().starts_with("GET /update?host=www&domain=example.com&"));
    }
}
