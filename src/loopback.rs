//! An in-memory [`Transport`] that replays scripted instrument replies.
//!
//! Drivers take any `Transport`, so the loopback lets them be exercised without
//! hardware: script the replies, run the driver, then inspect the commands it sent
//! through a [`LoopbackLog`] handle (which stays valid after the driver is dropped).

use crate::transport::{Transport, TransportError};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Block(Vec<u8>),
    Fail,
}

#[derive(Debug, Default)]
struct Journal {
    sent: Vec<String>,
    closes: usize,
}

/// Read access to what a [`LoopbackTransport`] has seen.
#[derive(Debug, Clone, Default)]
pub struct LoopbackLog {
    journal: Rc<RefCell<Journal>>,
}

impl LoopbackLog {
    /// Every command sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.journal.borrow().sent.clone()
    }

    /// How many times the connection was closed.
    pub fn close_count(&self) -> usize {
        self.journal.borrow().closes
    }
}

#[derive(Debug, Default)]
pub struct LoopbackTransport {
    replies: HashMap<String, VecDeque<Scripted>>,
    log: LoopbackLog,
    closed: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `command` query with `reply`.
    pub fn with_reply(mut self, command: &str, reply: &str) -> Self {
        self.push(command, Scripted::Text(reply.to_string()));
        self
    }

    /// Answer the next `command` block read with `data`.
    pub fn with_block(mut self, command: &str, data: &[u8]) -> Self {
        self.push(command, Scripted::Block(data.to_vec()));
        self
    }

    /// Fail the next exchange of `command` with an I/O error.
    pub fn with_failure(mut self, command: &str) -> Self {
        self.push(command, Scripted::Fail);
        self
    }

    pub fn log(&self) -> LoopbackLog {
        self.log.clone()
    }

    fn push(&mut self, command: &str, reply: Scripted) {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    fn record(&mut self, command: &str) -> Result<Option<Scripted>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.log.journal.borrow_mut().sent.push(command.to_string());
        Ok(self
            .replies
            .get_mut(command)
            .and_then(VecDeque::pop_front))
    }

    fn unanswered(command: &str) -> TransportError {
        TransportError::Timeout {
            command: command.to_string(),
            timeout: Duration::ZERO,
        }
    }

    fn broken(command: &str) -> TransportError {
        TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("scripted failure for '{}'", command),
        ))
    }
}

impl Transport for LoopbackTransport {
    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        match self.record(command)? {
            Some(Scripted::Text(reply)) => Ok(reply),
            Some(Scripted::Block(data)) => Ok(String::from_utf8(data)?),
            Some(Scripted::Fail) => Err(Self::broken(command)),
            None => Err(Self::unanswered(command)),
        }
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        match self.record(command)? {
            Some(Scripted::Fail) => Err(Self::broken(command)),
            _ => Ok(()),
        }
    }

    fn read_binary_block(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        match self.record(command)? {
            Some(Scripted::Block(data)) => Ok(data),
            Some(Scripted::Text(text)) => Ok(text.into_bytes()),
            Some(Scripted::Fail) => Err(Self::broken(command)),
            None => Err(Self::unanswered(command)),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.closed = true;
        self.log.journal.borrow_mut().closes += 1;
        Ok(())
    }
}
