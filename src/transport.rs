use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// A scoped connection to a SCPI instrument.
///
/// Implementations are strictly request/response: every call blocks until the
/// instrument answered or the configured timeout elapsed.
pub trait Transport {
    /// Send `command` and return the reply with the read terminator removed.
    fn query(&mut self, command: &str) -> Result<String, TransportError>;

    /// Send `command` without waiting for a reply.
    fn write(&mut self, command: &str) -> Result<(), TransportError>;

    /// Send `command` and read back one IEEE-488.2 binary block.
    fn read_binary_block(&mut self, command: &str) -> Result<Vec<u8>, TransportError>;

    /// Release the connection. Further calls fail with [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).query(command)
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        (**self).write(command)
    }

    fn read_binary_block(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        (**self).read_binary_block(command)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {timeout:?} waiting for the reply to '{command}'")]
    Timeout { command: String, timeout: Duration },

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed binary block: {0}")]
    BlockHeader(String),

    #[error("Connection already closed")]
    Closed,
}

/// Settings shared by every transport flavour.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Upper bound for a single exchange.
    pub timeout: Duration,
    pub read_terminator: String,
    pub write_terminator: String,
    /// Pause after every command; some instruments drop commands sent back to back.
    pub delay: Duration,
    pub baud_rate: u32,
    /// TCP port used for `TCPIP::<host>::INSTR` resources.
    pub instr_port: u16,
    /// Consume the terminator the instrument appends after a definite-length block.
    pub block_trailer: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            read_terminator: "\r\n".to_string(),
            write_terminator: "\r\n".to_string(),
            delay: Duration::from_millis(50),
            baud_rate: 9600,
            instr_port: 5555,
            block_trailer: true,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use the same terminator for both directions.
    pub fn with_terminator(mut self, terminator: &str) -> Self {
        self.read_terminator = terminator.to_string();
        self.write_terminator = terminator.to_string();
        self
    }

    pub fn with_read_terminator(mut self, terminator: &str) -> Self {
        self.read_terminator = terminator.to_string();
        self
    }

    pub fn with_write_terminator(mut self, terminator: &str) -> Self {
        self.write_terminator = terminator.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_instr_port(mut self, port: u16) -> Self {
        self.instr_port = port;
        self
    }

    pub fn with_block_trailer(mut self, block_trailer: bool) -> Self {
        self.block_trailer = block_trailer;
        self
    }
}

/// A byte stream an instrument can be reached through.
pub trait Link: Read + Write {
    /// Tear the link down. Dropping the link must also release it.
    fn shutdown(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Link for TcpStream {
    fn shutdown(&mut self) -> std::io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Link for Box<dyn SerialPort> {
    fn shutdown(&mut self) -> std::io::Result<()> {
        self.flush()
    }
}

const READ_CHUNK: usize = 4096;

/// Line-terminated SCPI over any [`Link`] (raw TCP socket or serial port).
pub struct StreamTransport<L: Link> {
    link: L,
    config: TransportConfig,
    pending: Vec<u8>,
    closed: bool,
}

impl<L: Link> StreamTransport<L> {
    pub fn new(link: L, config: TransportConfig) -> Self {
        Self {
            link,
            config,
            pending: Vec::new(),
            closed: false,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn pace(&self) {
        if !self.config.delay.is_zero() {
            thread::sleep(self.config.delay);
        }
    }

    fn send(&mut self, command: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        log::debug!("-> {}", command);
        let line = format!("{}{}", command, self.config.write_terminator);
        self.link.write_all(line.as_bytes())?;
        self.link.flush()?;
        Ok(())
    }

    /// Pull more bytes into `pending`, honouring `deadline`.
    fn fill(&mut self, command: &str, deadline: Instant) -> Result<(), TransportError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if Instant::now() >= deadline {
                return Err(self.timed_out(command));
            }
            match self.link.read(&mut buf) {
                Ok(0) => {
                    return Err(TransportError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "instrument closed the connection",
                    )))
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    return Ok(());
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn timed_out(&self, command: &str) -> TransportError {
        TransportError::Timeout {
            command: command.to_string(),
            timeout: self.config.timeout,
        }
    }

    /// Drop the unread rest of a failed exchange so the next reply starts clean.
    fn desync(&mut self, command: &str, error: TransportError) -> TransportError {
        log::warn!(
            "Reply to '{}' failed ({}); link may be desynchronized",
            command,
            error
        );
        self.pending.clear();
        error
    }

    fn read_text_reply(
        &mut self,
        command: &str,
        deadline: Instant,
    ) -> Result<String, TransportError> {
        let raw = self.read_until_terminator(command, deadline)?;
        Ok(String::from_utf8(raw)?)
    }

    fn read_until_terminator(
        &mut self,
        command: &str,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let terminator = self.config.read_terminator.as_bytes().to_vec();
        loop {
            if let Some(pos) = find(&self.pending, &terminator) {
                let line: Vec<u8> = self.pending.drain(..pos + terminator.len()).collect();
                return Ok(line[..pos].to_vec());
            }
            self.fill(command, deadline)?;
        }
    }

    fn read_exact_pending(
        &mut self,
        count: usize,
        command: &str,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        while self.pending.len() < count {
            self.fill(command, deadline)?;
        }
        Ok(self.pending.drain(..count).collect())
    }

    fn read_block(&mut self, command: &str, deadline: Instant) -> Result<Vec<u8>, TransportError> {
        let header = self.read_exact_pending(2, command, deadline)?;
        if header[0] != b'#' {
            return Err(TransportError::BlockHeader(format!(
                "expected '#', got 0x{:02x}",
                header[0]
            )));
        }
        let digits = match (header[1] as char).to_digit(10) {
            Some(d) => d as usize,
            None => {
                return Err(TransportError::BlockHeader(format!(
                    "invalid length digit count '{}'",
                    header[1] as char
                )))
            }
        };

        if digits == 0 {
            // Indefinite-length block runs up to the terminator.
            return self.read_until_terminator(command, deadline);
        }

        let length_field = self.read_exact_pending(digits, command, deadline)?;
        let length: usize = std::str::from_utf8(&length_field)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                TransportError::BlockHeader(format!(
                    "invalid length field '{}'",
                    String::from_utf8_lossy(&length_field)
                ))
            })?;

        let data = self.read_exact_pending(length, command, deadline)?;

        if self.config.block_trailer {
            let rest = self.read_until_terminator(command, deadline)?;
            if !rest.is_empty() {
                log::warn!("Discarding {} stray bytes after binary block", rest.len());
            }
        }
        Ok(data)
    }
}

impl<L: Link> Transport for StreamTransport<L> {
    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.send(command)?;
        let deadline = Instant::now() + self.config.timeout;
        let result = self.read_text_reply(command, deadline);
        let reply = result.map_err(|e| self.desync(command, e))?;
        log::debug!("<- {}", reply.trim());
        self.pace();
        Ok(reply.trim().to_string())
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        self.send(command)?;
        self.pace();
        Ok(())
    }

    fn read_binary_block(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        self.send(command)?;
        let deadline = Instant::now() + self.config.timeout;
        let result = self.read_block(command, deadline);
        let data = result.map_err(|e| self.desync(command, e))?;
        log::debug!("<- binary block of {} bytes", data.len());
        self.pace();
        Ok(data)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.closed = true;
        self.pending.clear();
        self.link.shutdown()?;
        log::debug!("Connection closed");
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
