use crate::command::{parse_integer, InstrumentError};
use crate::waveform_config::{DataFormat, ReadMode};
use std::str::FromStr;

/// Scaling metadata of one capture, as reported by `:WAVeform:PREamble?`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformPreamble {
    pub format: DataFormat,
    pub acquisition_type: ReadMode,
    pub point_count: u64,
    /// Number of averages in AVER acquisition mode, 1 otherwise.
    pub average_count: u64,
    /// Time between two neighbouring points.
    pub x_increment: f64,
    pub x_origin: f64,
    pub x_reference: f64,
    /// Voltage per sample code.
    pub y_increment: f64,
    pub y_origin: f64,
    pub y_reference: f64,
}

impl WaveformPreamble {
    pub const FIELD_COUNT: usize = 10;

    /// Parse the ten comma-separated fields
    /// `<format>,<type>,<points>,<count>,<xinc>,<xorig>,<xref>,<yinc>,<yorig>,<yref>`.
    pub fn parse(reply: &str) -> Result<Self, InstrumentError> {
        let fields: Vec<&str> = reply.trim().split(',').map(str::trim).collect();
        if fields.len() != Self::FIELD_COUNT {
            return Err(InstrumentError::Parse(format!(
                "preamble has {} fields, expected {}: '{}'",
                fields.len(),
                Self::FIELD_COUNT,
                reply.trim()
            )));
        }

        let integer = |index: usize, name: &str| {
            parse_integer(fields[index]).ok_or_else(|| {
                InstrumentError::Parse(format!("preamble {} '{}' is not an integer", name, fields[index]))
            })
        };
        let count = |index: usize, name: &str| {
            integer(index, name)?
                .try_into()
                .ok()
                .filter(|v: &u64| *v >= 1)
                .ok_or_else(|| {
                    InstrumentError::Parse(format!("preamble {} '{}' must be at least 1", name, fields[index]))
                })
        };
        let real = |index: usize, name: &str| {
            fields[index]
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    InstrumentError::Parse(format!("preamble {} '{}' is not a number", name, fields[index]))
                })
        };

        let format_code = integer(0, "format")?;
        let format = DataFormat::from_code(format_code).ok_or_else(|| {
            InstrumentError::Parse(format!("unknown waveform format code {}", format_code))
        })?;
        let type_code = integer(1, "type")?;
        let acquisition_type = ReadMode::from_code(type_code).ok_or_else(|| {
            InstrumentError::Parse(format!("unknown acquisition type code {}", type_code))
        })?;

        Ok(Self {
            format,
            acquisition_type,
            point_count: count(2, "points")?,
            average_count: count(3, "count")?,
            x_increment: real(4, "xincrement")?,
            x_origin: real(5, "xorigin")?,
            x_reference: real(6, "xreference")?,
            y_increment: real(7, "yincrement")?,
            y_origin: real(8, "yorigin")?,
            y_reference: real(9, "yreference")?,
        })
    }

    /// Voltage of one raw sample code.
    pub fn voltage(&self, code: f64) -> f64 {
        (code - self.y_origin - self.y_reference) * self.y_increment
    }

    /// Time offset of the `index`-th sample, counted from the first one read.
    pub fn time(&self, index: usize) -> f64 {
        index as f64 * self.x_increment
    }
}

impl FromStr for WaveformPreamble {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_synthetic_reply() {
        let preamble = WaveformPreamble::parse("0,2,1000,1,1e-6,0,0,0.02,0,0").unwrap();

        assert_eq!(preamble.format, DataFormat::Byte);
        assert_eq!(preamble.acquisition_type, ReadMode::Raw);
        assert_eq!(preamble.point_count, 1000);
        assert_eq!(preamble.average_count, 1);
        assert_eq!(preamble.x_increment, 1e-6);
        assert_eq!(preamble.y_increment, 0.02);
        assert_eq!(preamble.x_origin, 0.0);
        assert_eq!(preamble.x_reference, 0.0);
        assert_eq!(preamble.y_origin, 0.0);
        assert_eq!(preamble.y_reference, 0.0);
    }

    #[test]
    fn test_parse_instrument_reply() {
        let reply = "0,0,1200,1,1.000000e-08,-6.000000e-06,0,4.132813e-02,-3,127\n";
        let preamble: WaveformPreamble = reply.parse().unwrap();

        assert_eq!(preamble.acquisition_type, ReadMode::Normal);
        assert_eq!(preamble.point_count, 1200);
        assert_eq!(preamble.x_origin, -6.0e-6);
        assert_eq!(preamble.y_origin, -3.0);
        assert_eq!(preamble.y_reference, 127.0);
    }

    #[test]
    fn test_short_reply_is_error() {
        assert!(matches!(
            WaveformPreamble::parse("0,2,1000,1,1e-6,0,0,0.02,0"),
            Err(InstrumentError::Parse(_))
        ));
        assert!(matches!(
            WaveformPreamble::parse(""),
            Err(InstrumentError::Parse(_))
        ));
        assert!(matches!(
            WaveformPreamble::parse("0,2,1000,1,1e-6,0,0,0.02,0,0,7"),
            Err(InstrumentError::Parse(_))
        ));
    }

    #[test]
    fn test_bad_fields_are_errors() {
        for bad in [
            "3,2,1000,1,1e-6,0,0,0.02,0,0",
            "0,5,1000,1,1e-6,0,0,0.02,0,0",
            "0,2,0,1,1e-6,0,0,0.02,0,0",
            "0,2,1000,0,1e-6,0,0,0.02,0,0",
            "0,2,10.5,1,1e-6,0,0,0.02,0,0",
            "0,2,1000,1,abc,0,0,0.02,0,0",
            "0,2,1000,1,1e-6,0,0,inf,0,0",
        ] {
            assert!(WaveformPreamble::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_voltage_and_time() {
        let preamble = WaveformPreamble::parse("0,0,1200,1,2e-6,0,0,0.04,-3,127").unwrap();
        assert!((preamble.voltage(124.0) - 0.0).abs() < 1e-12);
        assert!((preamble.voltage(149.0) - 1.0).abs() < 1e-12);
        assert!((preamble.time(10) - 2e-5).abs() < 1e-18);
    }
}
