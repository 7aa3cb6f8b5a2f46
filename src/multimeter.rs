//! Fluke 8846A 6.5 digit precision multimeter.
//!
//! Range and resolution arguments take either a value in the measured unit or one of the
//! keywords `MIN`, `MAX` and `DEF`:
//!
//! ```rust,no_run
//! use scpi_bench::Fluke8846A;
//!
//! let mut meter = Fluke8846A::connect("TCPIP::169.254.1.2::3490::SOCKET", None)?;
//! meter.configure_dc_voltage(10.0, "MIN")?;
//! let readings = meter.read()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::command::{Arg, ArgSpec, CommandSpec, CommandTable, InstrumentError, ReplyKind, Session};
use crate::resource::{ConnectionError, InstrumentConnector};
use crate::transport::{Transport, TransportConfig};

const KEYWORDS: &[&str] = &["MIN", "MAX", "DEF"];

const LEVEL: ArgSpec = ArgSpec::Number {
    min: 0.0,
    max: 1.0e9,
    keywords: KEYWORDS,
};

const ON_OFF: ArgSpec = ArgSpec::Switch { on: "ON", off: "OFF" };

const RTD_TYPES: ArgSpec = ArgSpec::Choice(&["PT100_385", "PT100_392", "CUST1"]);

pub static COMMANDS: CommandTable = CommandTable {
    model: "Fluke 8846A",
    commands: &[
        CommandSpec::query("identify", "*IDN?", ReplyKind::Text),
        CommandSpec::query("operation_complete", "*OPC?", ReplyKind::Flag),
        CommandSpec::write("clear_status", "*CLS", &[]),
        CommandSpec::write("reset", "*RST", &[]),
        CommandSpec::write("self_test", "*TST", &[]),
        CommandSpec::write("local", "SYST:LOC", &[]),
        CommandSpec::write("remote", "SYST:REM", &[]),
        CommandSpec::query("configuration", "CONF?", ReplyKind::Text),
        CommandSpec::write("set_display", "DISP {}", &[ON_OFF]),
        // Filters
        CommandSpec::write("set_analog_filter", "FILT {}", &[ON_OFF]),
        CommandSpec::query("analog_filter", "FILT?", ReplyKind::Flag),
        CommandSpec::write("set_digital_filter", "FILT:DIG {}", &[ON_OFF]),
        CommandSpec::query("digital_filter", "FILT:DIG?", ReplyKind::Flag),
        // Resistance
        CommandSpec::write("configure_resistance", "CONF:RES {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("resistance_range", "SENS:RES:RANG?", ReplyKind::Float),
        CommandSpec::write("configure_four_wire_resistance", "CONF:FRES {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("four_wire_resistance_range", "SENS:FRES:RANG?", ReplyKind::Float),
        // Voltage
        CommandSpec::write("configure_dc_voltage", "CONF:VOLT:DC {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::write("set_dc_voltage_range", "SENS:VOLT:DC:RANG {}", &[LEVEL]),
        CommandSpec::write("set_dc_voltage_autorange", "SENS:VOLT:DC:RANG:AUTO {}", &[ON_OFF]),
        CommandSpec::write("set_dc_voltage_resolution", "SENS:VOLT:DC:RES {}", &[LEVEL]),
        CommandSpec::write(
            "set_dc_voltage_nplc",
            "SENS:VOLT:DC:NPLC {}",
            &[ArgSpec::Choice(&["0.02", "0.2", "1", "10", "100", "MIN", "MAX"])],
        ),
        CommandSpec::query("dc_voltage_range", "SENS:VOLT:DC:RANG?", ReplyKind::Float),
        CommandSpec::query("dc_voltage_resolution", "SENS:VOLT:DC:RES?", ReplyKind::Float),
        CommandSpec::query("dc_voltage_nplc", "SENS:VOLT:DC:NPLC?", ReplyKind::Float),
        CommandSpec::write("configure_ac_voltage", "CONF:VOLT:AC {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::write("set_ac_voltage_range", "SENS:VOLT:AC:RANG {}", &[LEVEL]),
        CommandSpec::query("ac_voltage_range", "SENS:VOLT:AC:RANG?", ReplyKind::Float),
        CommandSpec::write("configure_dc_voltage_ratio", "CONF:VOLT:DC:RATIO", &[]),
        // Current
        CommandSpec::write("configure_dc_current", "CONF:CURR:DC {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("dc_current_range", "SENS:CURR:DC:RANG?", ReplyKind::Float),
        CommandSpec::write("configure_ac_current", "CONF:CURR:AC {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::write("set_ac_current_range", "SENS:CURR:AC:RANG {}", &[LEVEL]),
        CommandSpec::write("set_ac_current_autorange", "SENS:CURR:AC:RANG:AUTO {}", &[ON_OFF]),
        CommandSpec::write("set_ac_current_resolution", "SENS:CURR:AC:RES {}", &[LEVEL]),
        CommandSpec::write(
            "set_ac_current_bandwidth",
            "SENS:CURR:AC:BAND {}",
            &[ArgSpec::Choice(&["3", "20", "200", "MIN", "MAX"])],
        ),
        CommandSpec::query("ac_current_range", "SENS:CURR:AC:RANG?", ReplyKind::Float),
        CommandSpec::query("ac_current_resolution", "SENS:CURR:AC:RES?", ReplyKind::Float),
        CommandSpec::query("ac_current_bandwidth", "SENS:CURR:AC:BAND?", ReplyKind::Float),
        // Frequency, period, capacitance
        CommandSpec::write("configure_frequency", "CONF:FREQ {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("frequency_range", "SENS:FREQ:RANG?", ReplyKind::Float),
        CommandSpec::write("configure_period", "CONF:PER {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("period_range", "SENS:PER:RANG?", ReplyKind::Float),
        CommandSpec::write("configure_capacitance", "CONF:CAP {}, {}", &[LEVEL, LEVEL]),
        CommandSpec::query("capacitance_range", "SENS:CAP:RANG?", ReplyKind::Float),
        // Temperature
        CommandSpec::write("configure_temperature", "CONF:TEMP:RTD {}", &[RTD_TYPES]),
        CommandSpec::write("configure_four_wire_temperature", "CONF:TEMP:FRTD {}", &[RTD_TYPES]),
        CommandSpec::write(
            "set_rtd_r0",
            "SENS:TEMP:TRAN:FRTD:R0 {}",
            &[ArgSpec::Float {
                min: 0.0,
                max: 1010.0,
                decimals: None,
            }],
        ),
        CommandSpec::write("configure_continuity", "CONF:CONT", &[]),
        CommandSpec::write("configure_diode", "CONF:DIOD {}, {}", &[ON_OFF, ON_OFF]),
        // Triggering
        CommandSpec::write(
            "set_trigger_source",
            "TRIG:SOUR {}",
            &[ArgSpec::Choice(&["BUS", "IMM", "EXT"])],
        ),
        CommandSpec::write(
            "set_trigger_delay",
            "TRIG:DEL {}",
            &[ArgSpec::Number {
                min: 0.0,
                max: 3600.0,
                keywords: &["MIN", "MAX"],
            }],
        ),
        CommandSpec::write(
            "set_trigger_count",
            "TRIG:COUN {}",
            &[ArgSpec::Number {
                min: 1.0,
                max: 50_000.0,
                keywords: &["MIN", "MAX", "INF"],
            }],
        ),
        CommandSpec::write(
            "set_sample_count",
            "SAMP:COUN {}",
            &[ArgSpec::Number {
                min: 1.0,
                max: 50_000.0,
                keywords: &["MIN", "MAX"],
            }],
        ),
        CommandSpec::write("initiate", "INIT", &[]),
        CommandSpec::query("read", "READ?", ReplyKind::List),
        CommandSpec::query_with(
            "fetch",
            "FETC{}?",
            &[ArgSpec::Integer { min: 1, max: 2 }],
            ReplyKind::List,
        ),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// `*TRG` or a bus trigger.
    Bus,
    Immediate,
    /// Rear panel trigger jack.
    External,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bus => "BUS",
            Self::Immediate => "IMM",
            Self::External => "EXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtdType {
    Pt100_385,
    Pt100_392,
    /// Uses the R0 and alpha parameters stored in the meter.
    Custom,
}

impl RtdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pt100_385 => "PT100_385",
            Self::Pt100_392 => "PT100_392",
            Self::Custom => "CUST1",
        }
    }
}

pub struct Fluke8846A<T: Transport = Box<dyn Transport>> {
    session: Session<T>,
}

impl Fluke8846A {
    pub fn connect(resource: &str, config: Option<TransportConfig>) -> Result<Self, ConnectionError> {
        let config = config.unwrap_or_default();
        let transport = InstrumentConnector::open(resource, &config)?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Fluke8846A<T> {
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

    pub fn operation_complete(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("operation_complete", &[])?.into_bool()
    }

    pub fn clear_status(&mut self) -> Result<(), InstrumentError> {
        self.write("clear_status", &[])
    }

    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        self.write("reset", &[])
    }

    pub fn self_test(&mut self) -> Result<(), InstrumentError> {
        self.write("self_test", &[])
    }

    pub fn switch_to_local(&mut self) -> Result<(), InstrumentError> {
        self.write("local", &[])
    }

    /// Lock the front panel.
    pub fn switch_to_remote(&mut self) -> Result<(), InstrumentError> {
        self.write("remote", &[])
    }

    /// Current function, range and resolution, e.g. `"VOLT +1.000000E+01,+1.000000E-06"`.
    pub fn configuration(&mut self) -> Result<String, InstrumentError> {
        self.session.execute("configuration", &[])?.into_text()
    }

    pub fn set_display(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_display", &[on.into()])
    }

    pub fn set_analog_filter(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_analog_filter", &[on.into()])
    }

    pub fn analog_filter(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("analog_filter", &[])?.into_bool()
    }

    pub fn set_digital_filter(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_digital_filter", &[on.into()])
    }

    pub fn digital_filter(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("digital_filter", &[])?.into_bool()
    }

    pub fn configure_resistance(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_resistance", &[range.into(), resolution.into()])
    }

    pub fn resistance_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("resistance_range")
    }

    pub fn configure_four_wire_resistance(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write(
            "configure_four_wire_resistance",
            &[range.into(), resolution.into()],
        )
    }

    pub fn four_wire_resistance_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("four_wire_resistance_range")
    }

    pub fn configure_dc_voltage(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_dc_voltage", &[range.into(), resolution.into()])
    }

    pub fn set_dc_voltage_range(&mut self, range: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_dc_voltage_range", &[range.into()])
    }

    pub fn set_dc_voltage_autorange(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_dc_voltage_autorange", &[on.into()])
    }

    pub fn set_dc_voltage_resolution(
        &mut self,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("set_dc_voltage_resolution", &[resolution.into()])
    }

    /// Integration time in power line cycles: 0.02, 0.2, 1, 10, 100, `MIN` or `MAX`.
    pub fn set_dc_voltage_nplc(&mut self, nplc: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_dc_voltage_nplc", &[nplc.into()])
    }

    pub fn dc_voltage_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("dc_voltage_range")
    }

    pub fn dc_voltage_resolution(&mut self) -> Result<f64, InstrumentError> {
        self.number("dc_voltage_resolution")
    }

    pub fn dc_voltage_nplc(&mut self) -> Result<f64, InstrumentError> {
        self.number("dc_voltage_nplc")
    }

    pub fn configure_ac_voltage(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_ac_voltage", &[range.into(), resolution.into()])
    }

    pub fn set_ac_voltage_range(&mut self, range: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_ac_voltage_range", &[range.into()])
    }

    pub fn ac_voltage_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("ac_voltage_range")
    }

    pub fn configure_dc_voltage_ratio(&mut self) -> Result<(), InstrumentError> {
        self.write("configure_dc_voltage_ratio", &[])
    }

    pub fn configure_dc_current(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_dc_current", &[range.into(), resolution.into()])
    }

    pub fn dc_current_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("dc_current_range")
    }

    pub fn configure_ac_current(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_ac_current", &[range.into(), resolution.into()])
    }

    pub fn set_ac_current_range(&mut self, range: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_ac_current_range", &[range.into()])
    }

    pub fn set_ac_current_autorange(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write("set_ac_current_autorange", &[on.into()])
    }

    pub fn set_ac_current_resolution(
        &mut self,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("set_ac_current_resolution", &[resolution.into()])
    }

    /// Input filter: 3 (slow), 20 (medium), 200 (fast), `MIN` or `MAX`.
    pub fn set_ac_current_bandwidth(
        &mut self,
        bandwidth: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("set_ac_current_bandwidth", &[bandwidth.into()])
    }

    pub fn ac_current_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("ac_current_range")
    }

    pub fn ac_current_resolution(&mut self) -> Result<f64, InstrumentError> {
        self.number("ac_current_resolution")
    }

    pub fn ac_current_bandwidth(&mut self) -> Result<f64, InstrumentError> {
        self.number("ac_current_bandwidth")
    }

    pub fn configure_frequency(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_frequency", &[range.into(), resolution.into()])
    }

    pub fn frequency_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("frequency_range")
    }

    pub fn configure_period(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_period", &[range.into(), resolution.into()])
    }

    pub fn period_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("period_range")
    }

    pub fn configure_capacitance(
        &mut self,
        range: impl Into<Arg>,
        resolution: impl Into<Arg>,
    ) -> Result<(), InstrumentError> {
        self.write("configure_capacitance", &[range.into(), resolution.into()])
    }

    pub fn capacitance_range(&mut self) -> Result<f64, InstrumentError> {
        self.number("capacitance_range")
    }

    pub fn configure_temperature(&mut self, rtd: RtdType) -> Result<(), InstrumentError> {
        self.write("configure_temperature", &[rtd.as_str().into()])
    }

    pub fn configure_four_wire_temperature(&mut self, rtd: RtdType) -> Result<(), InstrumentError> {
        self.write("configure_four_wire_temperature", &[rtd.as_str().into()])
    }

    /// Resistance at 0 °C of a [`RtdType::Custom`] sensor, 0 to 1010 Ω.
    pub fn set_rtd_r0(&mut self, r0: f64) -> Result<(), InstrumentError> {
        self.write("set_rtd_r0", &[r0.into()])
    }

    pub fn configure_continuity(&mut self) -> Result<(), InstrumentError> {
        self.write("configure_continuity", &[])
    }

    /// `low_current` selects 0.1 mA instead of 1 mA, `high_voltage` 10 V instead of 5 V.
    pub fn configure_diode(
        &mut self,
        low_current: bool,
        high_voltage: bool,
    ) -> Result<(), InstrumentError> {
        self.write("configure_diode", &[low_current.into(), high_voltage.into()])
    }

    pub fn set_trigger_source(&mut self, source: TriggerSource) -> Result<(), InstrumentError> {
        self.write("set_trigger_source", &[source.as_str().into()])
    }

    /// Seconds between trigger and measurement, 0 to 3600, `MIN` or `MAX`.
    pub fn set_trigger_delay(&mut self, delay: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_trigger_delay", &[delay.into()])
    }

    /// 1 to 50000, `MIN`, `MAX` or `INF`.
    pub fn set_trigger_count(&mut self, count: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_trigger_count", &[count.into()])
    }

    pub fn set_sample_count(&mut self, count: impl Into<Arg>) -> Result<(), InstrumentError> {
        self.write("set_sample_count", &[count.into()])
    }

    /// Arm the trigger system.
    pub fn initiate(&mut self) -> Result<(), InstrumentError> {
        self.write("initiate", &[])
    }

    /// Trigger and return every sample of the measurement.
    pub fn read(&mut self) -> Result<Vec<f64>, InstrumentError> {
        let fields = self.session.execute("read", &[])?.into_list()?;
        readings(&fields)
    }

    /// Readings of the primary (1) or secondary (2) display from the last measurement.
    pub fn fetch(&mut self, display: u8) -> Result<Vec<f64>, InstrumentError> {
        let fields = self.session.execute("fetch", &[display.into()])?.into_list()?;
        readings(&fields)
    }

    pub fn close(self) -> Result<(), InstrumentError> {
        self.session.close()
    }
}

fn readings(fields: &[String]) -> Result<Vec<f64>, InstrumentError> {
    fields
        .iter()
        .map(|f| {
            f.parse()
                .map_err(|_| InstrumentError::Parse(format!("'{}' is not a reading", f)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackTransport;

    #[test]
    fn test_configure_functions() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut meter = Fluke8846A::new(transport);

        meter.configure_dc_voltage(10, "MIN").unwrap();
        meter.configure_four_wire_resistance("def", "max").unwrap();
        meter.configure_ac_current(0.1, 1e-6).unwrap();
        meter.configure_four_wire_temperature(RtdType::Pt100_392).unwrap();
        meter.configure_diode(true, false).unwrap();
        meter.set_dc_voltage_nplc(10).unwrap();
        meter.set_dc_voltage_nplc(0.02).unwrap();
        meter.set_ac_current_bandwidth("MIN").unwrap();

        assert_eq!(
            log.sent(),
            vec![
                "CONF:VOLT:DC 10, MIN",
                "CONF:FRES DEF, MAX",
                "CONF:CURR:AC 0.1, 0.000001",
                "CONF:TEMP:FRTD PT100_392",
                "CONF:DIOD ON, OFF",
                "SENS:VOLT:DC:NPLC 10",
                "SENS:VOLT:DC:NPLC 0.02",
                "SENS:CURR:AC:BAND MIN",
            ]
        );
    }

    #[test]
    fn test_rejects_out_of_range_arguments() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut meter = Fluke8846A::new(transport);

        assert!(meter.set_dc_voltage_nplc(0.5).is_err());
        assert!(meter.set_ac_current_bandwidth(50).is_err());
        assert!(meter.set_rtd_r0(1010.5).is_err());
        assert!(meter.set_trigger_delay(3601).is_err());
        assert!(meter.set_trigger_count(0).is_err());
        assert!(meter.set_sample_count("INF").is_err());
        assert!(meter.configure_dc_voltage("AUTO", "MIN").is_err());
        assert!(matches!(
            meter.fetch(3),
            Err(InstrumentError::Validation(_))
        ));
        assert!(log.sent().is_empty());
    }

    #[test]
    fn test_triggering() {
        let transport = LoopbackTransport::new()
            .with_reply("READ?", "+1.000123E+01,+1.000125E+01")
            .with_reply("FETC2?", "+5.000000E+01");
        let log = transport.log();
        let mut meter = Fluke8846A::new(transport);

        meter.set_trigger_source(TriggerSource::External).unwrap();
        meter.set_trigger_delay("MIN").unwrap();
        meter.set_trigger_count("inf").unwrap();
        meter.set_sample_count(2).unwrap();
        meter.initiate().unwrap();
        let readings = meter.read().unwrap();
        let secondary = meter.fetch(2).unwrap();

        assert_eq!(readings.len(), 2);
        assert!((readings[1] - 10.00125).abs() < 1e-9);
        assert_eq!(secondary, vec![50.0]);
        assert_eq!(
            &log.sent()[..5],
            &["TRIG:SOUR EXT", "TRIG:DEL MIN", "TRIG:COUN INF", "SAMP:COUN 2", "INIT"]
        );
    }

    #[test]
    fn test_queries() {
        let transport = LoopbackTransport::new()
            .with_reply("SENS:RES:RANG?", "+1.000000E+03")
            .with_reply("FILT:DIG?", "1")
            .with_reply("CONF?", "\"RES +1.000000E+03,+1.000000E-03\"")
            .with_reply("READ?", "OVLD");
        let log = transport.log();
        let mut meter = Fluke8846A::new(transport);

        meter.clear_status().unwrap();
        assert!((meter.resistance_range().unwrap() - 1000.0).abs() < 1e-9);
        assert!(meter.digital_filter().unwrap());
        assert!(meter.configuration().unwrap().contains("RES"));
        assert!(matches!(meter.read(), Err(InstrumentError::Parse(_))));
        assert_eq!(log.sent()[0], "*CLS");
    }

    #[test]
    fn test_close_once() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        Fluke8846A::new(transport).close().unwrap();
        assert_eq!(log.close_count(), 1);
    }
}
