mod http;

use std::net::IpAddr;

#[cfg(feature = "regex")]
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::http::get_request;
use crate::transport::{
    ConnectError, PollConfig, Received, RetryPolicy, Session, Transport, MAX_RESPONSE_LEN,
};

pub const DEFAULT_ECHO_HOST: &str = "api.ipify.org";

/// Where the address sits in the echo service's response body.
#[derive(Debug, Clone, Default)]
pub enum AddressFormat {
    /// The last non-empty line, for services that wrap the address in markup.
    #[default]
    LastLine,

    /// The whole body, for services that answer with the address alone.
    Body,

    /// The first capture group of the regex.
    #[cfg(feature = "regex")]
    Regex(Regex),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("unable to send the request to {0}")]
    Send(Box<str>),

    #[error("{0} did not close the connection in time")]
    Timeout(Box<str>),

    #[error("{0} answered with HTTP status {1}")]
    Status(Box<str>, u16),

    #[error("the response from {0} is larger than {1} bytes")]
    TooLarge(Box<str>, usize),

    #[error("the response from {0} is not valid UTF-8")]
    Encoding(Box<str>),

    #[error("the response from {0} contains no address")]
    Empty(Box<str>),

    #[error("unable to parse an address out of {text:?}: {reason}")]
    InvalidAddress { text: Box<str>, reason: Box<str> },
}

/// Asks an IP-echo service for the public address this host is seen from.
#[derive(Debug, Clone)]
pub struct Resolver {
    host: Box<str>,
    port: u16,
    format: AddressFormat,
    retry: RetryPolicy,
    poll: PollConfig,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_HOST)
    }
}

impl Resolver {
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self {
            host: host.into(),
            port: 80,
            format: AddressFormat::default(),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_format(mut self, format: AddressFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run one exchange with the echo service over `transport`. The
    /// transport is stopped before this returns, whatever the outcome.
    pub fn resolve<T: Transport>(&self, transport: T) -> Result<IpAddr, ResolveError> {
        let raw = {
            let mut session = Session::new(transport);
            session.connect(&self.host, self.port, &self.retry)?;

            if !session.send(&get_request(&self.host, "/")) {
                return Err(ResolveError::Send(self.host.clone()));
            }

            match session.read_to_close(&self.poll) {
                Received::Closed(raw) => raw,
                Received::Overflow(_) => {
                    return Err(ResolveError::TooLarge(self.host.clone(), MAX_RESPONSE_LEN));
                }
                Received::TimedOut(partial) => {
                    debug!(host = %self.host, bytes = partial.len(), "gave up on a partial response");
                    return Err(ResolveError::Timeout(self.host.clone()));
                }
            }
        };

        let text = String::from_utf8(raw).map_err(|_| ResolveError::Encoding(self.host.clone()))?;
        let address = http::extract_address(&self.host, &text, &self.format)?;

        debug!(host = %self.host, %address, "resolved public address");
        Ok(address)
    }
}

/// Resolve the public address through the default echo service.
pub fn resolve_public_address<T: Transport>(transport: T) -> Result<IpAddr, ResolveError> {
    Resolver::default().resolve(transport)
}
