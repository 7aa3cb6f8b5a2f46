use crate::command::{Arg, ArgSpec, CommandSpec, CommandTable, InstrumentError, ReplyKind, Session};
use crate::resource::{ConnectionError, InstrumentConnector};
use crate::transport::{Transport, TransportConfig};
use std::time::Duration;

pub static COMMANDS: CommandTable = CommandTable {
    model: "Fluke 9142",
    commands: &[
        CommandSpec::query("identify", "*IDN?", ReplyKind::Text),
        CommandSpec::query("reference_temperature", "READ?", ReplyKind::Float),
        CommandSpec::query("reference_resistance", "SENS1:DATA?", ReplyKind::Float),
        CommandSpec::query("control_temperature", "SOUR:SENS:DATA? TEMP", ReplyKind::Float),
        CommandSpec::query("control_resistance", "SOUR:SENS:DATA? RES", ReplyKind::Float),
        CommandSpec::query("output_status", "OUT:STAT?", ReplyKind::Flag),
        CommandSpec::query("stability_limit", "SOUR:STAB:LIM?", ReplyKind::Float),
        CommandSpec::write(
            "set_stability_limit",
            "SOUR:STAB:LIM {}",
            &[ArgSpec::Float {
                min: 0.01,
                max: 9.99,
                decimals: None,
            }],
        ),
        CommandSpec::query("stability_status", "SOUR:STAB:TEST?", ReplyKind::Flag),
        CommandSpec::query("controller_stability", "SOUR:STAB:DAT?", ReplyKind::Float),
        CommandSpec::write(
            "set_point",
            "SOUR:SPO {}",
            &[ArgSpec::Float {
                min: -25.0,
                max: 150.0,
                decimals: Some(2),
            }],
        ),
        CommandSpec::write("set_output", "OUTP:STAT {}", &[ArgSpec::Switch { on: "1", off: "0" }]),
        CommandSpec::write("beep", "SYST:BEEP:IMM", &[]),
    ],
};

/// Fluke 9142 field metrology well (dry-well calibrator), -25 °C to 150 °C.
pub struct Fluke9142<T: Transport = Box<dyn Transport>> {
    session: Session<T>,
}

impl Fluke9142 {
    pub fn connect(resource: &str, config: Option<TransportConfig>) -> Result<Self, ConnectionError> {
        let config =
            config.unwrap_or_else(|| TransportConfig::default().with_delay(Duration::ZERO));
        let transport = InstrumentConnector::open(resource, &config)?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Fluke9142<T> {
    pub fn new(transport: T) -> Self {
        Self {
            session: Session::new(transport, &COMMANDS),
        }
    }

    fn write(&mut self, name: &str, args: &[Arg]) -> Result<(), InstrumentError> {
        self.session.execute(name, args).map(|_| ())
    }

    fn number(&mut self, name: &str) -> Result<f64, InstrumentError> {
        self.session.execute(name, &[])?.into_f64()
    }

    pub fn identify(&mut self) -> Result<String, InstrumentError> {
        self.session.execute("identify", &[])?.into_text()
    }

    /// Temperature of the external reference probe.
    pub fn reference_temperature(&mut self) -> Result<f64, InstrumentError> {
        self.number("reference_temperature")
    }

    pub fn reference_resistance(&mut self) -> Result<f64, InstrumentError> {
        self.number("reference_resistance")
    }

    pub fn control_temperature(&mut self) -> Result<f64, InstrumentError> {
        self.number("control_temperature")
    }

    pub fn control_resistance(&mut self) -> Result<f64, InstrumentError> {
        self.number("control_resistance")
    }

    /// Whether heating/cooling is enabled.
    pub fn output_status(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("output_status", &[])?.into_bool()
    }

    pub fn stability_limit(&mut self) -> Result<f64, InstrumentError> {
        self.number("stability_limit")
    }

    /// Accepted range is 0.01 to 9.99 °C.
    pub fn set_stability_limit(&mut self, limit: f64) -> Result<(), InstrumentError> {
        self.write("set_stability_limit", &[limit.into()])
    }

    /// Whether the well has settled within the stability limit.
    pub fn is_stable(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("stability_status", &[])?.into_bool()
    }

    pub fn controller_stability(&mut self) -> Result<f64, InstrumentError> {
        self.number("controller_stability")
    }

    /// Target temperature in °C, sent with two decimals.
    pub fn set_temperature(&mut self, celsius: f64) -> Result<(), InstrumentError> {
        self.write("set_point", &[celsius.into()])
    }

    pub fn set_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_output", &[on.into()])
    }

    pub fn beep(&mut self) -> Result<(), InstrumentError> {
        self.write("beep", &[])
    }

    pub fn close(self) -> Result<(), InstrumentError> {
        self.session.close()
    }
}
