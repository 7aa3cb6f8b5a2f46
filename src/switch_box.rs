use crate::command::{ArgSpec, CommandSpec, CommandTable, InstrumentError, Session};
use crate::resource::{ConnectionError, InstrumentConnector};
use crate::transport::{Transport, TransportConfig};
use std::time::Duration;

pub static COMMANDS: CommandTable = CommandTable {
    model: "Isotech 954",
    commands: &[CommandSpec::write(
        "switch_to_channel",
        "C0{}",
        &[ArgSpec::Integer { min: 1, max: 8 }],
    )],
};

/// Isotech 954 eight channel thermometer switch box.
pub struct Isotech954<T: Transport = Box<dyn Transport>> {
    session: Session<T>,
}

impl Isotech954 {
    pub fn connect(resource: &str, config: Option<TransportConfig>) -> Result<Self, ConnectionError> {
        let config =
            config.unwrap_or_else(|| TransportConfig::default().with_delay(Duration::ZERO));
        let transport = InstrumentConnector::open(resource, &config)?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Isotech954<T> {
    pub fn new(transport: T) -> Self {
        Self {
            session: Session::new(transport, &COMMANDS),
        }
    }

    /// Route input `channel` (1..=8) to the output and return it.
    pub fn switch_to_channel(&mut self, channel: u8) -> Result<u8, InstrumentError> {
        self.session.execute("switch_to_channel", &[channel.into()])?;
        log::debug!("Switched to channel {}", channel);
        Ok(channel)
    }

    pub fn close(self) -> Result<(), InstrumentError> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackTransport;

    #[test]
    fn test_switch_to_channel() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut switch = Isotech954::new(transport);

        for channel in 1..=8 {
            assert_eq!(switch.switch_to_channel(channel).unwrap(), channel);
        }
        assert_eq!(log.sent()[0], "C01");
        assert_eq!(log.sent()[7], "C08");
    }

    #[test]
    fn test_invalid_channel_sends_nothing() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut switch = Isotech954::new(transport);

        assert!(matches!(
            switch.switch_to_channel(9),
            Err(InstrumentError::Validation(_))
        ));
        assert!(switch.switch_to_channel(0).is_err());
        assert!(log.sent().is_empty());
    }

    #[test]
    fn test_dropped_switch_closes() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        {
            let mut switch = Isotech954::new(transport);
            switch.switch_to_channel(4).unwrap();
        }
        assert_eq!(log.close_count(), 1);
    }
}
