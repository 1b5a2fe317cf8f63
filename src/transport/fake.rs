//! A scripted in-memory transport that records what was done to it.

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Connector, Transport};

/// How the fake peer behaves for one transport.
#[derive(Debug, Clone, Default)]
pub struct Script {
    refusals: u32,
    response: Vec<u8>,
    chunk: usize,
    hang: bool,
    write_limit: Option<usize>,
}

impl Script {
    /// A peer that accepts the connection, sends `response` and hangs up.
    pub fn respond(response: &str) -> Self {
        Self {
            response: response.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    /// A peer that never accepts a connection.
    pub fn refuse() -> Self {
        Self {
            refusals: u32::MAX,
            ..Self::default()
        }
    }

    pub fn refused(mut self, times: u32) -> Self {
        self.refusals = times;
        self
    }

    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk = size;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }
}

#[derive(Debug, Default)]
pub struct Record {
    pub connects: Vec<(String, u16)>,
    pub written: Vec<u8>,
    pub stops: u32,
}

impl Record {
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

pub struct FakeTransport {
    script: Script,
    record: Rc<RefCell<Record>>,
    cursor: usize,
    open: bool,
}

impl FakeTransport {
    fn remaining(&self) -> usize {
        self.script.response.len() - self.cursor
    }
}

impl Transport for FakeTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.record.borrow_mut().connects.push((host.to_owned(), port));

        if self.script.refusals > 0 {
            if self.script.refusals != u32::MAX {
                self.script.refusals -= 1;
            }
            return false;
        }

        self.open = true;
        true
    }

    fn connected(&mut self) -> bool {
        self.open && (self.remaining() > 0 || self.script.hang)
    }

    fn available(&mut self) -> usize {
        if !self.open {
            return 0;
        }

        match self.script.chunk {
            0 => self.remaining(),
            size => self.remaining().min(size),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let count = self.available().min(buf.len());
        buf[..count].copy_from_slice(&self.script.response[self.cursor..self.cursor + count]);
        self.cursor += count;
        count
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if !self.open {
            return 0;
        }

        let mut record = self.record.borrow_mut();
        let accepted = match self.script.write_limit {
            Some(limit) => data.len().min(limit.saturating_sub(record.written.len())),
            None => data.len(),
        };

        record.written.extend_from_slice(&data[..accepted]);
        accepted
    }

    fn stop(&mut self) {
        self.record.borrow_mut().stops += 1;
        self.open = false;
    }
}

/// Hands out one fake transport per script, in order. Once the scripts run
/// out every further transport refuses to connect.
#[derive(Default)]
pub struct FakeConnector {
    scripts: VecDeque<Script>,
    records: Vec<Rc<RefCell<Record>>>,
}

impl FakeConnector {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            records: Vec::new(),
        }
    }

    /// Number of transports handed out so far.
    pub fn opened(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, index: usize) -> Ref<'_, Record> {
        self.records[index].borrow()
    }
}

impl Connector for FakeConnector {
    type Transport = FakeTransport;

    fn open(&mut self) -> FakeTransport {
        let script = self.scripts.pop_front().unwrap_or_else(Script::refuse);
        let record = Rc::new(RefCell::new(Record::default()));
        self.records.push(Rc::clone(&record));

        FakeTransport {
            script,
            record,
            cursor: 0,
            open: false,
        }
    }
}
