use crate::preamble::WaveformPreamble;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const TIME_COLUMN_NAME: &str = "time";

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Column length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A waveform in physical units: seconds against volts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysicalSeries {
    time: Vec<f64>,
    voltage: Vec<f64>,
}

impl PhysicalSeries {
    pub fn new(time: Vec<f64>, voltage: Vec<f64>) -> Result<Self, ConversionError> {
        if time.len() != voltage.len() {
            return Err(ConversionError::LengthMismatch {
                expected: time.len(),
                actual: voltage.len(),
            });
        }
        Ok(Self { time, voltage })
    }

    /// Attach the preamble's time axis to voltages the scope already scaled (ASCII format).
    pub fn from_voltages(voltage: Vec<f64>, preamble: &WaveformPreamble) -> Self {
        let time = (0..voltage.len()).map(|i| preamble.time(i)).collect();
        Self { time, voltage }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.time, self.voltage)
    }
}

/// Scale raw sample codes with the preamble of the channel they were read from.
pub fn to_physical(samples: &[u16], preamble: &WaveformPreamble) -> PhysicalSeries {
    #[cfg(feature = "cpu-profiling")]
    let _span = tracy_client::span!("to_physical");

    let time = (0..samples.len()).map(|i| preamble.time(i)).collect();
    let voltage = samples
        .iter()
        .map(|&code| preamble.voltage(f64::from(code)))
        .collect();
    PhysicalSeries { time, voltage }
}

/// Voltages of one or more sources sharing a single time axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Capture {
    time: Vec<f64>,
    channels: Vec<(String, Vec<f64>)>,
}

impl Capture {
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            channels: Vec::new(),
        }
    }

    /// Start a capture from the first channel's series.
    pub fn from_series(name: impl Into<String>, series: PhysicalSeries) -> Self {
        let (time, voltage) = series.into_parts();
        Self {
            time,
            channels: vec![(name.into(), voltage)],
        }
    }

    pub fn push_channel(
        &mut self,
        name: impl Into<String>,
        voltage: Vec<f64>,
    ) -> Result<(), ConversionError> {
        if voltage.len() != self.time.len() {
            return Err(ConversionError::LengthMismatch {
                expected: self.time.len(),
                actual: voltage.len(),
            });
        }
        self.channels.push((name.into(), voltage));
        Ok(())
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// `time` followed by one column per channel, in insertion order.
    pub fn to_dataframe(&self) -> Result<DataFrame, ConversionError> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.channels.len() + 1);
        columns.push(Series::new(TIME_COLUMN_NAME.into(), self.time.clone()).into());
        for (name, voltage) in &self.channels {
            columns.push(Series::new(name.as_str().into(), voltage.clone()).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Comma-separated rows, no header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ConversionError> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer)
            .include_header(false)
            .finish(&mut df)?;
        Ok(())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), ConversionError> {
        let path = path.as_ref();
        let mut file = BufWriter::new(File::create(path)?);
        self.write_csv(&mut file)?;
        file.flush()?;
        log::info!("Saved {} points to {}", self.len(), path.display());
        Ok(())
    }
}
