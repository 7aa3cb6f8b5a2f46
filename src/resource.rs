use crate::transport::{StreamTransport, Transport, TransportConfig};
use std::net::{TcpStream, ToSocketAddrs};

/// Where a VISA resource string points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Tcp { host: String, port: u16 },
    Serial { port: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{resource}' is not a valid resource string")]
    InvalidResource { resource: String },

    #[error("{interface} resources are not supported ('{resource}')")]
    Unsupported { resource: String, interface: String },
}

impl Resource {
    /// Parse a VISA resource string.
    ///
    /// Supported forms:
    /// - `TCPIP[n]::<host>::<port>::SOCKET`
    /// - `TCPIP[n]::<host>[::INSTR]`, served by the raw SCPI socket at `instr_port`
    /// - `ASRL<device>::INSTR`, e.g. `ASRL/dev/ttyUSB0::INSTR` or `ASRLCOM3::INSTR`
    /// - `ASRL<n>::INSTR`, the n-th serial port of the platform
    pub fn parse(resource: &str, instr_port: u16) -> Result<Self, ConnectionError> {
        let invalid = || ConnectionError::InvalidResource {
            resource: resource.to_string(),
        };
        let parts: Vec<&str> = resource.trim().split("::").collect();
        let interface = parts[0].to_ascii_uppercase();

        if interface.starts_with("TCPIP") {
            if !interface["TCPIP".len()..].chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let host = match parts.get(1) {
                Some(h) if !h.is_empty() => (*h).to_string(),
                _ => return Err(invalid()),
            };
            let suffix: Vec<String> = parts[2..].iter().map(|p| p.to_ascii_uppercase()).collect();
            return match suffix.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                [] | ["INSTR"] => Ok(Self::Tcp {
                    host,
                    port: instr_port,
                }),
                [port, "SOCKET"] => Ok(Self::Tcp {
                    host,
                    port: port.parse().map_err(|_| invalid())?,
                }),
                _ => Err(invalid()),
            };
        }

        if interface.starts_with("ASRL") {
            // Keep the original spelling, device paths are case sensitive.
            let device = &parts[0]["ASRL".len()..];
            if device.is_empty() || parts.len() > 2 {
                return Err(invalid());
            }
            if let Some(suffix) = parts.get(1) {
                if !suffix.eq_ignore_ascii_case("INSTR") {
                    return Err(invalid());
                }
            }
            let port = match device.parse::<u32>() {
                Ok(number) => numbered_serial_port(number).ok_or_else(invalid)?,
                Err(_) => device.to_string(),
            };
            return Ok(Self::Serial { port });
        }

        for unsupported in ["USB", "GPIB", "VXI", "PXI"] {
            if interface.starts_with(unsupported) {
                return Err(ConnectionError::Unsupported {
                    resource: resource.to_string(),
                    interface: unsupported.to_string(),
                });
            }
        }
        Err(invalid())
    }
}

#[cfg(windows)]
fn numbered_serial_port(number: u32) -> Option<String> {
    Some(format!("COM{}", number))
}

#[cfg(not(windows))]
fn numbered_serial_port(number: u32) -> Option<String> {
    number.checked_sub(1).map(|n| format!("/dev/ttyS{}", n))
}

pub struct InstrumentConnector;

impl InstrumentConnector {
    /// Open the instrument behind `resource`.
    pub fn open(
        resource: &str,
        config: &TransportConfig,
    ) -> Result<Box<dyn Transport>, ConnectionError> {
        match Resource::parse(resource, config.instr_port)? {
            Resource::Tcp { host, port } => {
                log::debug!("Connecting to {}:{}", host, port);
                let addr = (host.as_str(), port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| ConnectionError::InvalidResource {
                        resource: resource.to_string(),
                    })?;
                let stream = TcpStream::connect_timeout(&addr, config.timeout)?;
                stream.set_read_timeout(Some(config.timeout))?;
                stream.set_write_timeout(Some(config.timeout))?;
                stream.set_nodelay(true)?;
                Ok(Box::new(StreamTransport::new(stream, config.clone())))
            }
            Resource::Serial { port } => {
                log::debug!("Opening serial port {} at {} baud", port, config.baud_rate);
                let serial = serialport::new(&port, config.baud_rate)
                    .timeout(config.timeout)
                    .open()?;
                serial.clear(serialport::ClearBuffer::All)?;
                Ok(Box::new(StreamTransport::new(serial, config.clone())))
            }
        }
    }

    /// Serial instruments currently visible to the OS, as `ASRL…::INSTR` strings.
    pub fn list_instruments() -> Result<Vec<String>, ConnectionError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| format!("ASRL{}::INSTR", p.port_name))
            .collect())
    }
}
