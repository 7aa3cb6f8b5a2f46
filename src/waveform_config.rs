use crate::command::InstrumentError;
use std::fmt;
use std::str::FromStr;

fn rejected(what: &str, value: &str) -> InstrumentError {
    InstrumentError::Validation(format!("'{}' is not a valid {}", value, what))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalogChannel {
    Chan1,
    Chan2,
    Chan3,
    Chan4,
}

impl AnalogChannel {
    pub const ALL: [Self; 4] = [Self::Chan1, Self::Chan2, Self::Chan3, Self::Chan4];

    pub fn from_number(number: u8) -> Result<Self, InstrumentError> {
        match number {
            1 => Ok(Self::Chan1),
            2 => Ok(Self::Chan2),
            3 => Ok(Self::Chan3),
            4 => Ok(Self::Chan4),
            other => Err(InstrumentError::Validation(format!(
                "analog channel {} does not exist, expected 1..=4",
                other
            ))),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Chan1 => 1,
            Self::Chan2 => 2,
            Self::Chan3 => 3,
            Self::Chan4 => 4,
        }
    }

    /// Zero-based slot, used for per-channel state.
    pub fn index(self) -> usize {
        usize::from(self.number() - 1)
    }
}

/// One of the logic analyzer inputs D0..D15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DigitalChannel(u8);

impl DigitalChannel {
    pub const COUNT: u8 = 16;

    pub fn new(number: u8) -> Result<Self, InstrumentError> {
        if number < Self::COUNT {
            Ok(Self(number))
        } else {
            Err(InstrumentError::Validation(format!(
                "digital channel D{} does not exist, expected D0..=D15",
                number
            )))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

/// Channel whose waveform `:WAV:DATA?` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WaveformSource {
    Analog(AnalogChannel),
    Digital(DigitalChannel),
    Math,
}

impl WaveformSource {
    pub fn as_analog(self) -> Option<AnalogChannel> {
        match self {
            Self::Analog(channel) => Some(channel),
            _ => None,
        }
    }
}

impl From<AnalogChannel> for WaveformSource {
    fn from(channel: AnalogChannel) -> Self {
        Self::Analog(channel)
    }
}

impl From<DigitalChannel> for WaveformSource {
    fn from(channel: DigitalChannel) -> Self {
        Self::Digital(channel)
    }
}

impl fmt::Display for WaveformSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analog(channel) => write!(f, "CHAN{}", channel.number()),
            Self::Digital(channel) => write!(f, "D{}", channel.number()),
            Self::Math => write!(f, "MATH"),
        }
    }
}

impl FromStr for WaveformSource {
    type Err = InstrumentError;

    /// Accepts the short and long SCPI spellings, e.g. `CHAN1`, `CHANnel1`, `D7`, `MATH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if upper == "MATH" {
            return Ok(Self::Math);
        }
        let analog = upper
            .strip_prefix("CHANNEL")
            .or_else(|| upper.strip_prefix("CHAN"));
        if let Some(number) = analog {
            return match number.parse::<u8>() {
                Ok(n @ 1..=4) => AnalogChannel::from_number(n).map(Self::Analog),
                _ => Err(rejected("waveform source", s)),
            };
        }
        if let Some(number) = upper.strip_prefix('D') {
            if number.len() <= 2 && number.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = number.parse::<u8>() {
                    return DigitalChannel::new(n)
                        .map(Self::Digital)
                        .map_err(|_| rejected("waveform source", s));
                }
            }
        }
        Err(rejected("waveform source", s))
    }
}

/// Which buffer `:WAV:DATA?` reads: the screen (NORM/MAX) or acquisition memory (RAW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    Normal,
    Max,
    Raw,
}

impl ReadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORM",
            Self::Max => "MAX",
            Self::Raw => "RAW",
        }
    }

    /// Numeric code used by the preamble.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Max),
            2 => Some(Self::Raw),
            _ => None,
        }
    }
}

impl FromStr for ReadMode {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORM" | "NORMAL" => Ok(Self::Normal),
            "MAX" | "MAXIMUM" => Ok(Self::Max),
            "RAW" => Ok(Self::Raw),
            _ => Err(rejected("read mode", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Byte,
    Word,
    Ascii,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::Ascii => "ASC",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Ascii),
            _ => None,
        }
    }

    /// Bytes per sample for the binary formats.
    pub fn sample_width(&self) -> Option<usize> {
        match self {
            Self::Byte => Some(1),
            Self::Word => Some(2),
            Self::Ascii => None,
        }
    }
}

impl FromStr for DataFormat {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BYTE" => Ok(Self::Byte),
            "WORD" => Ok(Self::Word),
            "ASC" | "ASCII" => Ok(Self::Ascii),
            _ => Err(rejected("return format", s)),
        }
    }
}

/// `:ACQuire:TYPE` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
    Normal,
    Averages,
    Peak,
    HighResolution,
}

impl AcquisitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORM",
            Self::Averages => "AVER",
            Self::Peak => "PEAK",
            Self::HighResolution => "HRES",
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORM" | "NORMAL" => Ok(Self::Normal),
            "AVER" | "AVERAGES" => Ok(Self::Averages),
            "PEAK" => Ok(Self::Peak),
            "HRES" | "HRESOLUTION" => Ok(Self::HighResolution),
            _ => Err(rejected("acquisition mode", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryDepth {
    Auto,
    Points(u64),
}

impl fmt::Display for MemoryDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "AUTO"),
            Self::Points(points) => write!(f, "{}", points),
        }
    }
}

impl FromStr for MemoryDepth {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("AUTO") {
            return Ok(Self::Auto);
        }
        crate::command::parse_integer(trimmed)
            .and_then(|p| u64::try_from(p).ok())
            .map(Self::Points)
            .ok_or_else(|| rejected("memory depth", s))
    }
}

/// What to pull off the scope in one [`acquire`](crate::RigolDS1054Z::acquire) call.
///
/// ```rust
/// use scpi_bench::{AcquisitionRequest, AnalogChannel};
///
/// let request = AcquisitionRequest::of(AnalogChannel::Chan1)
///     .and(AnalogChannel::Chan3)
///     .from_memory()
///     .points(1_200_000);
/// assert_eq!(request.sources().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    sources: Vec<WaveformSource>,
    mode: ReadMode,
    format: DataFormat,
    points: Option<u64>,
    chunk_size: Option<u64>,
}

impl AcquisitionRequest {
    pub fn of(source: impl Into<WaveformSource>) -> Self {
        Self {
            sources: vec![source.into()],
            mode: ReadMode::Normal,
            format: DataFormat::Byte,
            points: None,
            chunk_size: None,
        }
    }

    /// Add another source; it shares the time axis of the first one.
    pub fn and(mut self, source: impl Into<WaveformSource>) -> Self {
        let source = source.into();
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        self
    }

    /// Read what is displayed (NORM).
    pub fn from_screen(mut self) -> Self {
        self.mode = ReadMode::Normal;
        self
    }

    /// Read the screen while running, memory while stopped (MAX).
    pub fn from_max(mut self) -> Self {
        self.mode = ReadMode::Max;
        self
    }

    /// Read acquisition memory (RAW). The scope has to be stopped.
    pub fn from_memory(mut self) -> Self {
        self.mode = ReadMode::Raw;
        self
    }

    pub fn mode(mut self, mode: ReadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Number of memory points to read; defaults to the preamble's point count.
    pub fn points(mut self, points: u64) -> Self {
        self.points = Some(points);
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn sources(&self) -> &[WaveformSource] {
        &self.sources
    }

    pub fn read_mode(&self) -> ReadMode {
        self.mode
    }

    pub fn data_format(&self) -> DataFormat {
        self.format
    }

    pub fn requested_points(&self) -> Option<u64> {
        self.points
    }

    pub fn requested_chunk_size(&self) -> Option<u64> {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_spellings() {
        assert_eq!(
            "CHAN1".parse::<WaveformSource>().unwrap(),
            WaveformSource::Analog(AnalogChannel::Chan1)
        );
        assert_eq!(
            "CHANnel4".parse::<WaveformSource>().unwrap(),
            WaveformSource::Analog(AnalogChannel::Chan4)
        );
        assert_eq!(
            "d15".parse::<WaveformSource>().unwrap(),
            WaveformSource::Digital(DigitalChannel::new(15).unwrap())
        );
        assert_eq!("MATH".parse::<WaveformSource>().unwrap(), WaveformSource::Math);
    }

    #[test]
    fn test_source_rejections() {
        for bad in ["CHAN0", "CHAN5", "CHANNEL", "D16", "D-1", "D", "D007", "FFT", ""] {
            assert!(
                matches!(
                    bad.parse::<WaveformSource>(),
                    Err(InstrumentError::Validation(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_source_display_round_trips() {
        let sources = AnalogChannel::ALL
            .into_iter()
            .map(WaveformSource::from)
            .chain((0..16).map(|n| WaveformSource::Digital(DigitalChannel::new(n).unwrap())))
            .chain([WaveformSource::Math]);
        for source in sources {
            assert_eq!(source.to_string().parse::<WaveformSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_channel_numbers() {
        assert_eq!(AnalogChannel::Chan3.index(), 2);
        assert!(AnalogChannel::from_number(0).is_err());
        assert!(AnalogChannel::from_number(5).is_err());
        assert!(DigitalChannel::new(16).is_err());
    }

    #[test]
    fn test_mode_and_format_codes() {
        assert_eq!("maximum".parse::<ReadMode>().unwrap(), ReadMode::Max);
        assert_eq!(ReadMode::from_code(2), Some(ReadMode::Raw));
        assert_eq!(ReadMode::from_code(3), None);
        assert_eq!("ascii".parse::<DataFormat>().unwrap(), DataFormat::Ascii);
        assert_eq!(DataFormat::from_code(1), Some(DataFormat::Word));
        assert!("FLOAT".parse::<DataFormat>().is_err());
        assert_eq!(DataFormat::Word.sample_width(), Some(2));
        assert_eq!(
            "HRESolution".parse::<AcquisitionMode>().unwrap(),
            AcquisitionMode::HighResolution
        );
    }

    #[test]
    fn test_memory_depth() {
        assert_eq!("AUTO".parse::<MemoryDepth>().unwrap(), MemoryDepth::Auto);
        assert_eq!(
            "1.200000e+06".parse::<MemoryDepth>().unwrap(),
            MemoryDepth::Points(1_200_000)
        );
        assert!("lots".parse::<MemoryDepth>().is_err());
    }

    #[test]
    fn test_request_builder() {
        let request = AcquisitionRequest::of(AnalogChannel::Chan2)
            .and(AnalogChannel::Chan2)
            .and(WaveformSource::Math)
            .from_memory()
            .format(DataFormat::Word)
            .chunk_size(62_500);

        assert_eq!(
            request.sources(),
            &[
                WaveformSource::Analog(AnalogChannel::Chan2),
                WaveformSource::Math
            ]
        );
        assert_eq!(request.read_mode(), ReadMode::Raw);
        assert_eq!(request.data_format(), DataFormat::Word);
        assert_eq!(request.requested_points(), None);
        assert_eq!(request.requested_chunk_size(), Some(62_500));
    }
}
