use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::{Connector, Transport, MAX_RESPONSE_LEN};

/// [`Transport`] over a std `TcpStream`. The stream is kept non-blocking so
/// `available()` and `connected()` can be answered without waiting; writes
/// temporarily switch it back to blocking mode.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pending: Vec<u8>,
    eof: bool,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            pending: Vec::new(),
            eof: true,
            connect_timeout,
        }
    }

    /// Move what the kernel has buffered into `pending`, up to
    /// [`MAX_RESPONSE_LEN`] bytes. The rest waits until `pending` is read.
    fn fill(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            self.eof = true;
            return;
        };

        let mut chunk = [0u8; 512];

        while !self.eof && self.pending.len() < MAX_RESPONSE_LEN {
            let room = (MAX_RESPONSE_LEN - self.pending.len()).min(chunk.len());

            match stream.read(&mut chunk[..room]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("read failed, treating the connection as closed: {}", e);
                    self.eof = true;
                }
            }
        }
    }

    fn write_blocking(stream: &mut TcpStream, data: &[u8]) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        let written = stream.write_all(data).and_then(|_| stream.flush());
        stream.set_nonblocking(true)?;
        written
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.stop();

        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host, "unable to resolve host: {}", e);
                return false;
            }
        };

        for addr in addrs {
            let stream = match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%addr, "connect failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nonblocking(true) {
                debug!(%addr, "unable to make the socket non-blocking: {}", e);
                continue;
            }

            // A stuck peer must not hold a write forever.
            if let Err(e) = stream.set_write_timeout(Some(self.connect_timeout)) {
                debug!(%addr, "unable to set the write timeout: {}", e);
            }

            self.stream = Some(stream);
            self.eof = false;
            return true;
        }

        false
    }

    fn connected(&mut self) -> bool {
        self.fill();
        !self.eof
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.pending.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let count = self.pending.len().min(buf.len());
        buf[..count].copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        count
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };

        match Self::write_blocking(stream, data) {
            Ok(()) => data.len(),
            Err(e) => {
                debug!("write failed: {}", e);
                0
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        self.pending.clear();
        self.eof = true;
    }
}

/// Opens a new [`TcpTransport`] for every exchange.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn open(&mut self) -> TcpTransport {
        TcpTransport::new(self.connect_timeout)
    }
}
