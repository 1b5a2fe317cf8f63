#[cfg(feature = "tcp")]
mod tcp;

#[cfg(test)]
pub(crate) mod fake;

use std::num::NonZeroU32;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

#[cfg(feature = "tcp")]
pub use tcp::{TcpConnector, TcpTransport};

/// Responses are always drained to the end, but only this many bytes are kept.
pub const MAX_RESPONSE_LEN: usize = 16 * 1024;

/// A byte-oriented TCP client in the shape of the client sockets exposed by
/// network shields. None of the calls fail outright; failures are reported
/// through the return values, and the owner decides what they mean.
pub trait Transport {
    /// Open a connection to `host:port`. Returns whether it was established.
    fn connect(&mut self, host: &str, port: u16) -> bool;

    /// Whether the peer still holds its end of the connection open.
    fn connected(&mut self) -> bool;

    /// Number of received bytes that can be read without waiting.
    fn available(&mut self) -> usize;

    /// Copy up to `buf.len()` received bytes into `buf` and return the count.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Send `data` and return how many bytes were accepted.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Close the connection and release the underlying socket.
    fn stop(&mut self);

    /// Write `line` followed by CRLF. Returns false on a short write.
    fn println(&mut self, line: &str) -> bool {
        let written = self.write(line.as_bytes()) + self.write(b"\r\n");
        written == line.len() + 2
    }
}

/// Hands out a fresh, unconnected transport for every exchange, so no socket
/// is ever shared between the echo service and the provider.
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self) -> Self::Transport;
}

impl<T, F> Connector for F
where
    T: Transport,
    F: FnMut() -> T,
{
    type Transport = T;

    fn open(&mut self) -> T {
        self()
    }
}

/// How often, and how patiently, a connection is attempted before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: NonZeroU32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN),
            delay: Duration::from_millis(100),
        }
    }
}

/// Pacing of the wait-for-data spin. `timeout` bounds the whole read phase of
/// one exchange, measured from the first poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to connect to {host}:{port} after {attempts} attempt(s)")]
pub struct ConnectError {
    pub host: Box<str>,
    pub port: u16,
    pub attempts: u32,
}

/// What came back before the exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// The peer closed the connection; everything it sent is here.
    Closed(Vec<u8>),

    /// The peer closed the connection, but it sent more than
    /// [`MAX_RESPONSE_LEN`] bytes and only the first ones were kept.
    Overflow(Vec<u8>),

    /// The read timeout elapsed first; only a partial response is here.
    TimedOut(Vec<u8>),
}

/// Scoped ownership of a transport for a single request/response exchange.
/// The transport is stopped exactly once, when the session is dropped,
/// whichever way the exchange ends.
pub struct Session<T: Transport> {
    transport: T,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        retry: &RetryPolicy,
    ) -> Result<(), ConnectError> {
        let attempts = retry.attempts.get();

        for attempt in 1..=attempts {
            if self.transport.connect(host, port) {
                debug!(host, port, attempt, "connected");
                return Ok(());
            }

            trace!(host, port, attempt, "connection attempt failed");

            if attempt < attempts {
                thread::sleep(retry.delay);
            }
        }

        Err(ConnectError {
            host: host.into(),
            port,
            attempts,
        })
    }

    /// Write a complete request. Returns false if the transport accepted
    /// fewer bytes than the request holds.
    pub fn send(&mut self, request: &str) -> bool {
        self.transport.write(request.as_bytes()) == request.len()
    }

    /// Read until the peer closes the connection or `poll.timeout` elapses.
    pub fn read_to_close(&mut self, poll: &PollConfig) -> Received {
        let started = Instant::now();
        let mut received = Vec::new();
        let mut chunk = [0u8; 256];
        let mut overflowed = false;

        loop {
            let available = self.transport.available();

            if available > 0 {
                let wanted = available.min(chunk.len());
                let read = self.transport.read(&mut chunk[..wanted]);
                let room = MAX_RESPONSE_LEN.saturating_sub(received.len());
                overflowed |= read > room;
                received.extend_from_slice(&chunk[..read.min(room)]);
            } else if !self.transport.connected() {
                return if overflowed {
                    Received::Overflow(received)
                } else {
                    Received::Closed(received)
                };
            } else {
                thread::sleep(poll.interval);
            }

            if started.elapsed() >= poll.timeout {
                return Received::TimedOut(received);
            }
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.transport.stop();
    }
}
