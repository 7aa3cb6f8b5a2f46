use crate::command::{Arg, ArgSpec, CommandSpec, CommandTable, InstrumentError, ReplyKind, Session};
use crate::conversion::{to_physical, Capture, PhysicalSeries};
use crate::memory_reader::{read_chunks, ChunkPlan, RawSampleBuffer};
use crate::preamble::WaveformPreamble;
use crate::resource::{ConnectionError, InstrumentConnector};
use crate::transport::{Transport, TransportConfig};
use crate::waveform_config::{
    AcquisitionMode, AcquisitionRequest, AnalogChannel, DataFormat, MemoryDepth, ReadMode,
    WaveformSource,
};
use std::time::Duration;

const SOURCES: &[&str] = &[
    "CHAN1", "CHAN2", "CHAN3", "CHAN4", "MATH", "D0", "D1", "D2", "D3", "D4", "D5", "D6", "D7",
    "D8", "D9", "D10", "D11", "D12", "D13", "D14", "D15",
];

const MEMORY_DEPTHS: &[&str] = &[
    "AUTO", "3000", "6000", "12000", "30000", "60000", "120000", "300000", "600000", "1200000",
    "3000000", "6000000", "12000000", "24000000",
];

const AVERAGES: &[&str] = &["2", "4", "8", "16", "32", "64", "128", "256", "512", "1024"];

/// Highest index the table lets through. The usable depth is `ScopeLimits::max_memory_depth`,
/// checked by the driver before a read starts.
const MAX_MEMORY_INDEX: i64 = i64::MAX;

pub static COMMANDS: CommandTable = CommandTable {
    model: "Rigol DS1054Z",
    commands: &[
        CommandSpec::query("identify", "*IDN?", ReplyKind::Text),
        CommandSpec::query("event_enable", "*ESE?", ReplyKind::Integer),
        CommandSpec::write(
            "set_event_enable",
            "*ESE {}",
            &[ArgSpec::Integer { min: 0, max: 255 }],
        ),
        CommandSpec::query("event_register", "*ESR?", ReplyKind::Integer),
        CommandSpec::query("operation_complete", "*OPC?", ReplyKind::Flag),
        CommandSpec::write("reset", "*RST", &[]),
        CommandSpec::write("self_test", "*TST", &[]),
        CommandSpec::write("auto_scale", ":AUT", &[]),
        CommandSpec::write("clear", ":CLE", &[]),
        CommandSpec::write("run", ":RUN", &[]),
        CommandSpec::write("stop", ":STOP", &[]),
        CommandSpec::write("single", ":SING", &[]),
        CommandSpec::write("force_trigger", ":TFOR", &[]),
        CommandSpec::write("set_averages", ":ACQ:AVER {}", &[ArgSpec::Choice(AVERAGES)]),
        CommandSpec::query("averages", ":ACQ:AVER?", ReplyKind::Integer),
        CommandSpec::write(
            "set_memory_depth",
            ":ACQ:MDEP {}",
            &[ArgSpec::Choice(MEMORY_DEPTHS)],
        ),
        CommandSpec::query("memory_depth", ":ACQ:MDEP?", ReplyKind::Text),
        CommandSpec::write(
            "set_acquisition_mode",
            ":ACQ:TYPE {}",
            &[ArgSpec::Choice(&["NORM", "AVER", "PEAK", "HRES"])],
        ),
        CommandSpec::query("acquisition_mode", ":ACQ:TYPE?", ReplyKind::Text),
        CommandSpec::query("sample_rate", ":ACQ:SRAT?", ReplyKind::Float),
        CommandSpec::write("set_waveform_source", ":WAV:SOUR {}", &[ArgSpec::Choice(SOURCES)]),
        CommandSpec::query("waveform_source", ":WAV:SOUR?", ReplyKind::Text),
        CommandSpec::write(
            "set_read_mode",
            ":WAV:MODE {}",
            &[ArgSpec::Choice(&["NORM", "MAX", "RAW"])],
        ),
        CommandSpec::query("read_mode", ":WAV:MODE?", ReplyKind::Text),
        CommandSpec::write(
            "set_data_format",
            ":WAV:FORM {}",
            &[ArgSpec::Choice(&["BYTE", "WORD", "ASC"])],
        ),
        CommandSpec::query("data_format", ":WAV:FORM?", ReplyKind::Text),
        CommandSpec::write(
            "set_waveform_start",
            ":WAV:STAR {}",
            &[ArgSpec::Integer {
                min: 1,
                max: MAX_MEMORY_INDEX,
            }],
        ),
        CommandSpec::write(
            "set_waveform_stop",
            ":WAV:STOP {}",
            &[ArgSpec::Integer {
                min: 1,
                max: MAX_MEMORY_INDEX,
            }],
        ),
        CommandSpec::query("waveform_data", ":WAV:DATA?", ReplyKind::Block),
        CommandSpec::query("waveform_preamble", ":WAV:PRE?", ReplyKind::Text),
    ],
};

/// Transfer limits of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimits {
    /// Most points a single `:WAV:DATA?` may return in RAW mode.
    pub max_chunk_points: u64,
    pub max_memory_depth: u64,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            max_chunk_points: 125_000,
            max_memory_depth: 24_000_000,
        }
    }
}

impl ScopeLimits {
    pub fn with_max_chunk_points(mut self, points: u64) -> Self {
        self.max_chunk_points = points;
        self
    }

    pub fn with_max_memory_depth(mut self, points: u64) -> Self {
        self.max_memory_depth = points;
        self
    }
}

/// What the session knows about one analog channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelState {
    preamble: Option<WaveformPreamble>,
}

impl ChannelState {
    /// Preamble of the most recent fetch while this channel was the waveform source.
    pub fn preamble(&self) -> Option<&WaveformPreamble> {
        self.preamble.as_ref()
    }
}

/// Samples of one source together with the preamble that scales them.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    pub source: WaveformSource,
    pub preamble: WaveformPreamble,
    pub samples: RawSampleBuffer,
}

impl WaveformData {
    pub fn to_physical(&self) -> PhysicalSeries {
        to_physical(self.samples.samples(), &self.preamble)
    }
}

pub struct RigolDS1054Z<T: Transport = Box<dyn Transport>> {
    session: Session<T>,
    limits: ScopeLimits,
    channels: [ChannelState; 4],
    /// Waveform source selected on the instrument, once known.
    selected: Option<WaveformSource>,
    format: DataFormat,
}

impl RigolDS1054Z {
    /// Connect through a VISA-style resource string, e.g. `TCPIP::192.168.123.2::INSTR`.
    ///
    /// Without a config the scope's LAN defaults apply: `\n` terminated and no pacing delay.
    pub fn connect(
        resource: &str,
        config: Option<TransportConfig>,
    ) -> Result<Self, ConnectionError> {
        let config = config.unwrap_or_else(|| {
            TransportConfig::default()
                .with_terminator("\n")
                .with_delay(Duration::ZERO)
        });
        let transport = InstrumentConnector::open(resource, &config)?;
        let mut scope = Self::new(transport, ScopeLimits::default());
        match scope.identify() {
            Ok(idn) => log::debug!("Connected to {}", idn),
            Err(e) => log::warn!("{} did not identify itself: {}", resource, e),
        }
        Ok(scope)
    }
}

impl<T: Transport> RigolDS1054Z<T> {
    pub fn new(transport: T, limits: ScopeLimits) -> Self {
        Self {
            session: Session::new(transport, &COMMANDS),
            limits,
            channels: [ChannelState::default(); 4],
            selected: None,
            format: DataFormat::Byte,
        }
    }

    pub fn limits(&self) -> &ScopeLimits {
        &self.limits
    }

    fn write(&mut self, name: &str, args: &[Arg]) -> Result<(), InstrumentError> {
        self.session.execute(name, args).map(|_| ())
    }

    fn check_mode(source: WaveformSource, mode: ReadMode) -> Result<(), InstrumentError> {
        if source == WaveformSource::Math && mode != ReadMode::Normal {
            return Err(InstrumentError::Validation(format!(
                "MATH only supports NORM read mode, not {}",
                mode.as_str()
            )));
        }
        Ok(())
    }

    /// Select the waveform source, read mode and return format in one go.
    pub fn configure_channel(
        &mut self,
        source: WaveformSource,
        mode: ReadMode,
        format: DataFormat,
    ) -> Result<(), InstrumentError> {
        Self::check_mode(source, mode)?;
        log::debug!(
            "Configuring {} for {} reads in {}",
            source,
            mode.as_str(),
            format.as_str()
        );
        // Unknown until the source write has gone through.
        self.selected = None;
        self.write("set_waveform_source", &[source.to_string().into()])?;
        self.selected = Some(source);
        self.write("set_read_mode", &[mode.as_str().into()])?;
        self.write("set_data_format", &[format.as_str().into()])?;
        self.format = format;
        Ok(())
    }

    /// Read `:WAV:PRE?` and remember it for the selected analog channel.
    pub fn fetch_preamble(&mut self) -> Result<WaveformPreamble, InstrumentError> {
        let source = match self.selected {
            Some(source) => source,
            None => {
                let source = self.waveform_source()?;
                self.selected = Some(source);
                source
            }
        };
        let reply = self.session.execute("waveform_preamble", &[])?.into_text()?;
        let preamble = WaveformPreamble::parse(&reply)?;
        if let Some(channel) = source.as_analog() {
            self.channels[channel.index()].preamble = Some(preamble);
        }
        Ok(preamble)
    }

    pub fn channel_state(&self, channel: AnalogChannel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    fn waveform_block(&mut self) -> Result<Vec<u8>, InstrumentError> {
        self.session.execute("waveform_data", &[])?.into_block()
    }

    /// Byte samples of what is currently displayed for `source`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn read_screen(&mut self, source: WaveformSource) -> Result<WaveformData, InstrumentError> {
        self.configure_channel(source, ReadMode::Normal, DataFormat::Byte)?;
        let preamble = self.fetch_preamble()?;
        let data = self.waveform_block()?;
        let samples = RawSampleBuffer::from_block(DataFormat::Byte, &data)?;
        Ok(WaveformData {
            source,
            preamble,
            samples,
        })
    }

    /// Displayed waveform of `source` with the scope doing the scaling (ASC format).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn read_screen_voltages(
        &mut self,
        source: WaveformSource,
    ) -> Result<PhysicalSeries, InstrumentError> {
        self.configure_channel(source, ReadMode::Normal, DataFormat::Ascii)?;
        let preamble = self.fetch_preamble()?;
        let data = self.waveform_block()?;
        let voltages = parse_ascii_voltages(&data)?;
        Ok(PhysicalSeries::from_voltages(voltages, &preamble))
    }

    fn check_memory_read(
        &self,
        source: WaveformSource,
        total_points: u64,
        chunk_size: u64,
        format: DataFormat,
    ) -> Result<(), InstrumentError> {
        Self::check_mode(source, ReadMode::Raw)?;
        if format == DataFormat::Ascii {
            return Err(InstrumentError::Validation(
                "memory reads need BYTE or WORD format".to_string(),
            ));
        }
        if chunk_size == 0 || chunk_size > self.limits.max_chunk_points {
            return Err(InstrumentError::Validation(format!(
                "chunk size {} is outside [1, {}]",
                chunk_size, self.limits.max_chunk_points
            )));
        }
        let depth = self
            .limits
            .max_memory_depth
            .min(MAX_MEMORY_INDEX.unsigned_abs());
        if total_points > depth {
            return Err(InstrumentError::Validation(format!(
                "{} points exceed the memory depth of {}",
                total_points, depth
            )));
        }
        Ok(())
    }

    /// Read `total_points` of acquisition memory for `source` in chunks of `chunk_size`.
    ///
    /// Samples come in the format of the last [`configure_channel`](Self::configure_channel),
    /// BYTE if none. The scope has to be stopped.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn read_memory(
        &mut self,
        source: WaveformSource,
        total_points: u64,
        chunk_size: u64,
    ) -> Result<RawSampleBuffer, InstrumentError> {
        let format = self.format;
        self.check_memory_read(source, total_points, chunk_size, format)?;
        if total_points == 0 {
            return Ok(RawSampleBuffer::new(format));
        }
        self.configure_channel(source, ReadMode::Raw, format)?;
        let plan = ChunkPlan::new(total_points, chunk_size)?;
        read_chunks(&mut self.session, plan, format)
    }

    /// Read every source of `request` and scale it onto one time axis.
    #[tracing::instrument(level = "debug", skip(self, request), fields(sources = request.sources().len()))]
    pub fn acquire(&mut self, request: &AcquisitionRequest) -> Result<Capture, InstrumentError> {
        let mode = request.read_mode();
        let format = request.data_format();
        if format == DataFormat::Ascii {
            return Err(InstrumentError::Validation(
                "acquire reads sample codes; use read_screen_voltages for ASCII data".to_string(),
            ));
        }
        let chunk_size = request
            .requested_chunk_size()
            .unwrap_or(self.limits.max_chunk_points);
        for &source in request.sources() {
            Self::check_mode(source, mode)?;
            if mode == ReadMode::Raw {
                let points = request.requested_points().unwrap_or(1);
                self.check_memory_read(source, points, chunk_size, format)?;
            }
        }

        let mut capture: Option<Capture> = None;
        for &source in request.sources() {
            self.configure_channel(source, mode, format)?;
            let preamble = self.fetch_preamble()?;
            let samples = if mode == ReadMode::Raw {
                let points = match request.requested_points() {
                    Some(points) => points,
                    None if preamble.point_count > self.limits.max_memory_depth => {
                        log::warn!(
                            "{} reports {} points, reading only the first {}",
                            source,
                            preamble.point_count,
                            self.limits.max_memory_depth
                        );
                        self.limits.max_memory_depth
                    }
                    None => preamble.point_count,
                };
                let plan = ChunkPlan::new(points, chunk_size)?;
                read_chunks(&mut self.session, plan, format)?
            } else {
                let data = self.waveform_block()?;
                RawSampleBuffer::from_block(format, &data)?
            };
            log::debug!("Read {} samples from {}", samples.len(), source);

            let series = to_physical(samples.samples(), &preamble);
            capture = Some(match capture.take() {
                None => Capture::from_series(source.to_string(), series),
                Some(mut capture) => {
                    let (_, voltage) = series.into_parts();
                    capture.push_channel(source.to_string(), voltage)?;
                    capture
                }
            });
        }
        Ok(capture.unwrap_or_default())
    }

    pub fn identify(&mut self) -> Result<String, InstrumentError> {
        self.session.execute("identify", &[])?.into_text()
    }

    pub fn event_enable(&mut self) -> Result<u8, InstrumentError> {
        register(self.session.execute("event_enable", &[])?.into_i64()?)
    }

    pub fn set_event_enable(&mut self, value: u8) -> Result<(), InstrumentError> {
        self.write("set_event_enable", &[value.into()])
    }

    /// Read and clear the standard event register.
    pub fn event_register(&mut self) -> Result<u8, InstrumentError> {
        register(self.session.execute("event_register", &[])?.into_i64()?)
    }

    pub fn operation_complete(&mut self) -> Result<bool, InstrumentError> {
        self.session.execute("operation_complete", &[])?.into_bool()
    }

    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        self.selected = None;
        self.write("reset", &[])
    }

    pub fn self_test(&mut self) -> Result<(), InstrumentError> {
        self.write("self_test", &[])
    }

    pub fn auto_scale(&mut self) -> Result<(), InstrumentError> {
        self.write("auto_scale", &[])
    }

    /// Clear all waveforms on screen.
    pub fn clear(&mut self) -> Result<(), InstrumentError> {
        self.write("clear", &[])
    }

    pub fn run(&mut self) -> Result<(), InstrumentError> {
        self.write("run", &[])
    }

    pub fn stop(&mut self) -> Result<(), InstrumentError> {
        self.write("stop", &[])
    }

    pub fn single(&mut self) -> Result<(), InstrumentError> {
        self.write("single", &[])
    }

    pub fn force_trigger(&mut self) -> Result<(), InstrumentError> {
        self.write("force_trigger", &[])
    }

    /// Number of averages in AVER mode, a power of two from 2 to 1024.
    pub fn set_averages(&mut self, count: u32) -> Result<(), InstrumentError> {
        self.write("set_averages", &[count.into()])
    }

    pub fn averages(&mut self) -> Result<u32, InstrumentError> {
        let count = self.session.execute("averages", &[])?.into_i64()?;
        u32::try_from(count)
            .map_err(|_| InstrumentError::Parse(format!("average count {} out of range", count)))
    }

    /// Allowed depths depend on how many channels are enabled; the instrument has the final word.
    pub fn set_memory_depth(&mut self, depth: MemoryDepth) -> Result<(), InstrumentError> {
        self.write("set_memory_depth", &[depth.to_string().into()])
    }

    pub fn memory_depth(&mut self) -> Result<MemoryDepth, InstrumentError> {
        let reply = self.session.execute("memory_depth", &[])?.into_text()?;
        reply
            .parse()
            .map_err(|_| InstrumentError::Parse(format!("'{}' is not a memory depth", reply)))
    }

    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), InstrumentError> {
        self.write("set_acquisition_mode", &[mode.as_str().into()])
    }

    pub fn acquisition_mode(&mut self) -> Result<AcquisitionMode, InstrumentError> {
        let reply = self.session.execute("acquisition_mode", &[])?.into_text()?;
        reply
            .parse()
            .map_err(|_| InstrumentError::Parse(format!("'{}' is not an acquisition mode", reply)))
    }

    /// Current sample rate in Sa/s.
    pub fn sample_rate(&mut self) -> Result<f64, InstrumentError> {
        self.session.execute("sample_rate", &[])?.into_f64()
    }

    pub fn waveform_source(&mut self) -> Result<WaveformSource, InstrumentError> {
        let reply = self.session.execute("waveform_source", &[])?.into_text()?;
        reply
            .parse()
            .map_err(|_| InstrumentError::Parse(format!("'{}' is not a waveform source", reply)))
    }

    pub fn read_mode(&mut self) -> Result<ReadMode, InstrumentError> {
        let reply = self.session.execute("read_mode", &[])?.into_text()?;
        reply
            .parse()
            .map_err(|_| InstrumentError::Parse(format!("'{}' is not a read mode", reply)))
    }

    pub fn data_format(&mut self) -> Result<DataFormat, InstrumentError> {
        let reply = self.session.execute("data_format", &[])?.into_text()?;
        reply
            .parse()
            .map_err(|_| InstrumentError::Parse(format!("'{}' is not a return format", reply)))
    }

    /// Raw `:WAV:DATA?` block in whatever mode and format are configured.
    pub fn waveform_data(&mut self) -> Result<Vec<u8>, InstrumentError> {
        self.waveform_block()
    }

    pub fn close(self) -> Result<(), InstrumentError> {
        self.session.close()
    }
}

fn register(value: i64) -> Result<u8, InstrumentError> {
    u8::try_from(value)
        .map_err(|_| InstrumentError::Parse(format!("register value {} out of range", value)))
}

/// ASC waveforms are comma-separated voltages in scientific notation.
fn parse_ascii_voltages(data: &[u8]) -> Result<Vec<f64>, InstrumentError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| InstrumentError::Parse(format!("ASCII waveform is not UTF-8: {}", e)))?;
    text.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| InstrumentError::Parse(format!("'{}' is not a voltage", field)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackTransport;
    use crate::waveform_config::DigitalChannel;

    const PREAMBLE: &str = "0,2,10,1,1e-6,0,0,0.02,0,0";
    const CHAN1: WaveformSource = WaveformSource::Analog(AnalogChannel::Chan1);
    const CHAN3: WaveformSource = WaveformSource::Analog(AnalogChannel::Chan3);

    fn scope(transport: LoopbackTransport) -> RigolDS1054Z<LoopbackTransport> {
        RigolDS1054Z::new(transport, ScopeLimits::default())
    }

    #[test]
    fn test_configure_channel() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut scope = scope(transport);

        scope
            .configure_channel(CHAN3, ReadMode::Raw, DataFormat::Word)
            .unwrap();
        let source: WaveformSource = "CHANnel2".parse().unwrap();
        scope
            .configure_channel(source, ReadMode::Max, DataFormat::Ascii)
            .unwrap();

        assert_eq!(
            log.sent(),
            vec![
                ":WAV:SOUR CHAN3",
                ":WAV:MODE RAW",
                ":WAV:FORM WORD",
                ":WAV:SOUR CHAN2",
                ":WAV:MODE MAX",
                ":WAV:FORM ASC",
            ]
        );
    }

    #[test]
    fn test_math_only_reads_screen() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut scope = scope(transport);

        for mode in [ReadMode::Max, ReadMode::Raw] {
            assert!(matches!(
                scope.configure_channel(WaveformSource::Math, mode, DataFormat::Byte),
                Err(InstrumentError::Validation(_))
            ));
        }
        assert!(log.sent().is_empty());
        scope
            .configure_channel(WaveformSource::Math, ReadMode::Normal, DataFormat::Byte)
            .unwrap();
        assert_eq!(log.sent()[0], ":WAV:SOUR MATH");
    }

    #[test]
    fn test_preamble_lands_in_selected_channel() {
        let transport = LoopbackTransport::new().with_reply(":WAV:PRE?", PREAMBLE);
        let mut scope = scope(transport);

        scope
            .configure_channel(CHAN3, ReadMode::Normal, DataFormat::Byte)
            .unwrap();
        let preamble = scope.fetch_preamble().unwrap();

        assert_eq!(
            scope.channel_state(AnalogChannel::Chan3).preamble(),
            Some(&preamble)
        );
        for channel in [AnalogChannel::Chan1, AnalogChannel::Chan2, AnalogChannel::Chan4] {
            assert_eq!(scope.channel_state(channel).preamble(), None);
        }
    }

    #[test]
    fn test_preamble_is_superseded() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_reply(":WAV:PRE?", "0,0,1200,1,2e-6,0,0,0.04,-3,127");
        let mut scope = scope(transport);

        scope
            .configure_channel(CHAN1, ReadMode::Normal, DataFormat::Byte)
            .unwrap();
        scope.fetch_preamble().unwrap();
        scope.fetch_preamble().unwrap();

        let cached = scope.channel_state(AnalogChannel::Chan1).preamble().unwrap();
        assert_eq!(cached.point_count, 1200);
    }

    #[test]
    fn test_preamble_asks_for_unknown_source() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:SOUR?", "CHAN4")
            .with_reply(":WAV:PRE?", PREAMBLE);
        let log = transport.log();
        let mut scope = scope(transport);

        scope.fetch_preamble().unwrap();

        assert_eq!(log.sent(), vec![":WAV:SOUR?", ":WAV:PRE?"]);
        assert!(scope.channel_state(AnalogChannel::Chan4).preamble().is_some());
    }

    #[test]
    fn test_digital_and_math_preambles_not_cached() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_reply(":WAV:PRE?", PREAMBLE);
        let mut scope = scope(transport);

        let d5 = WaveformSource::Digital(DigitalChannel::new(5).unwrap());
        scope
            .configure_channel(d5, ReadMode::Normal, DataFormat::Byte)
            .unwrap();
        scope.fetch_preamble().unwrap();
        scope
            .configure_channel(WaveformSource::Math, ReadMode::Normal, DataFormat::Byte)
            .unwrap();
        scope.fetch_preamble().unwrap();

        assert!(AnalogChannel::ALL
            .iter()
            .all(|&c| scope.channel_state(c).preamble().is_none()));
    }

    #[test]
    fn test_short_preamble_is_parse_error() {
        let transport = LoopbackTransport::new().with_reply(":WAV:PRE?", "0,2,1000,1,1e-6,0,0,0.02,0");
        let mut scope = scope(transport);
        scope
            .configure_channel(CHAN1, ReadMode::Normal, DataFormat::Byte)
            .unwrap();

        assert!(matches!(
            scope.fetch_preamble(),
            Err(InstrumentError::Parse(_))
        ));
        assert!(scope.channel_state(AnalogChannel::Chan1).preamble().is_none());
    }

    #[test]
    fn test_read_screen() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50, 100]);
        let log = transport.log();
        let mut scope = scope(transport);

        let waveform = scope.read_screen(CHAN1).unwrap();
        let series = waveform.to_physical();

        assert_eq!(
            log.sent(),
            vec![
                ":WAV:SOUR CHAN1",
                ":WAV:MODE NORM",
                ":WAV:FORM BYTE",
                ":WAV:PRE?",
                ":WAV:DATA?",
            ]
        );
        assert_eq!(waveform.samples.samples(), &[0, 50, 100]);
        assert!((series.voltage()[1] - 1.0).abs() < 1e-9);
        assert!((series.time()[2] - 2e-6).abs() < 1e-15);
    }

    #[test]
    fn test_read_screen_voltages() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", "2,0,3,1,1e-3,0,0,0.04,0,127")
            .with_block(":WAV:DATA?", b"-1.200000e-01,0.000000e+00,1.600000e-01,");
        let mut scope = scope(transport);

        let series = scope.read_screen_voltages(CHAN1).unwrap();

        assert_eq!(series.voltage(), &[-0.12, 0.0, 0.16]);
        assert!((series.time()[2] - 2e-3).abs() < 1e-12);
    }

    #[test]
    fn test_read_memory_in_chunks() {
        let transport = LoopbackTransport::new()
            .with_block(":WAV:DATA?", &[1, 2, 3])
            .with_block(":WAV:DATA?", &[4, 5, 6])
            .with_block(":WAV:DATA?", &[7]);
        let log = transport.log();
        let mut scope = RigolDS1054Z::new(transport, ScopeLimits::default().with_max_chunk_points(3));

        let buffer = scope.read_memory(CHAN3, 7, 3).unwrap();

        assert_eq!(buffer.samples(), &[1, 2, 3, 4, 5, 6, 7]);
        let sent = log.sent();
        assert_eq!(&sent[..3], &[":WAV:SOUR CHAN3", ":WAV:MODE RAW", ":WAV:FORM BYTE"]);
        assert_eq!(
            &sent[3..],
            &[
                ":WAV:STAR 1",
                ":WAV:STOP 3",
                ":WAV:DATA?",
                ":WAV:STAR 4",
                ":WAV:STOP 6",
                ":WAV:DATA?",
                ":WAV:STAR 7",
                ":WAV:STOP 7",
                ":WAV:DATA?",
            ]
        );
    }

    #[test]
    fn test_read_memory_word_format() {
        let transport = LoopbackTransport::new().with_block(":WAV:DATA?", &[0x10, 0x00, 0x20, 0x00]);
        let mut scope = scope(transport);

        scope
            .configure_channel(CHAN1, ReadMode::Normal, DataFormat::Word)
            .unwrap();
        let buffer = scope.read_memory(CHAN1, 2, 1000).unwrap();
        assert_eq!(buffer.format(), DataFormat::Word);
        assert_eq!(buffer.samples(), &[0x10, 0x20]);
    }

    #[test]
    fn test_read_memory_failure_mid_read() {
        let transport = LoopbackTransport::new()
            .with_block(":WAV:DATA?", &[1, 2, 3])
            .with_failure(":WAV:DATA?")
            .with_block(":WAV:DATA?", &[7, 8, 9]);
        let mut scope = scope(transport);

        let err = scope.read_memory(CHAN1, 9, 3).unwrap_err();
        assert!(matches!(
            err,
            InstrumentError::Transfer { chunk: 1, start: 4, stop: 6, .. }
        ));
    }

    #[test]
    fn test_read_memory_validation() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut scope = scope(transport);

        for (total, chunk) in [(10, 0), (10, 125_001), (24_000_001, 125_000)] {
            assert!(matches!(
                scope.read_memory(CHAN1, total, chunk),
                Err(InstrumentError::Validation(_))
            ));
        }
        assert!(matches!(
            scope.read_memory(WaveformSource::Math, 10, 10),
            Err(InstrumentError::Validation(_))
        ));
        assert!(log.sent().is_empty());

        scope
            .configure_channel(CHAN1, ReadMode::Normal, DataFormat::Ascii)
            .unwrap();
        let before = log.sent().len();
        assert!(matches!(
            scope.read_memory(CHAN1, 10, 10),
            Err(InstrumentError::Validation(_))
        ));
        assert_eq!(log.sent().len(), before);
    }

    #[test]
    fn test_read_memory_follows_raised_limits() {
        let half = vec![7u8; 12_000_001];
        let transport = LoopbackTransport::new()
            .with_block(":WAV:DATA?", &half)
            .with_block(":WAV:DATA?", &half);
        let log = transport.log();
        let limits = ScopeLimits::default()
            .with_max_memory_depth(48_000_000)
            .with_max_chunk_points(12_000_001);
        let mut scope = RigolDS1054Z::new(transport, limits);

        let buffer = scope.read_memory(CHAN1, 24_000_002, 12_000_001).unwrap();

        assert_eq!(buffer.len(), 24_000_002);
        assert_eq!(
            &log.sent()[3..],
            &[
                ":WAV:STAR 1",
                ":WAV:STOP 12000001",
                ":WAV:DATA?",
                ":WAV:STAR 12000002",
                ":WAV:STOP 24000002",
                ":WAV:DATA?",
            ]
        );
    }

    #[test]
    fn test_read_memory_beyond_index_range_sends_nothing() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let limits = ScopeLimits::default().with_max_memory_depth(u64::MAX);
        let mut scope = RigolDS1054Z::new(transport, limits);

        assert!(matches!(
            scope.read_memory(CHAN1, u64::MAX, 125_000),
            Err(InstrumentError::Validation(_))
        ));
        assert!(log.sent().is_empty());
    }

    #[test]
    fn test_read_memory_nothing_to_read() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut scope = scope(transport);

        let buffer = scope.read_memory(CHAN1, 0, 125_000).unwrap();
        assert!(buffer.is_empty());
        assert!(log.sent().is_empty());
    }

    #[test]
    fn test_acquire_two_channels_from_memory() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50])
            .with_block(":WAV:DATA?", &[100, 150])
            .with_reply(":WAV:PRE?", "0,2,10,1,1e-6,0,0,0.01,0,0")
            .with_block(":WAV:DATA?", &[10, 20])
            .with_block(":WAV:DATA?", &[30, 40]);
        let mut scope = scope(transport);

        let request = AcquisitionRequest::of(AnalogChannel::Chan1)
            .and(AnalogChannel::Chan3)
            .from_memory()
            .points(4)
            .chunk_size(2);
        let capture = scope.acquire(&request).unwrap();

        assert_eq!(capture.len(), 4);
        assert_eq!(
            capture.channel_names().collect::<Vec<_>>(),
            vec!["CHAN1", "CHAN3"]
        );
        let chan1 = capture.channel("CHAN1").unwrap();
        let chan3 = capture.channel("CHAN3").unwrap();
        assert!((chan1[3] - 3.0).abs() < 1e-9);
        assert!((chan3[3] - 0.4).abs() < 1e-9);
        assert!(scope.channel_state(AnalogChannel::Chan3).preamble().is_some());
    }

    #[test]
    fn test_acquire_screen_uses_preamble_points() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50, 100]);
        let log = transport.log();
        let mut scope = scope(transport);

        let capture = scope
            .acquire(&AcquisitionRequest::of(AnalogChannel::Chan2))
            .unwrap();

        assert_eq!(capture.len(), 3);
        assert!(!log.sent().iter().any(|c| c.starts_with(":WAV:STAR")));
    }

    #[test]
    fn test_acquire_memory_clamps_preamble_points() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50])
            .with_block(":WAV:DATA?", &[100, 150]);
        let log = transport.log();
        let limits = ScopeLimits::default()
            .with_max_memory_depth(4)
            .with_max_chunk_points(2);
        let mut scope = RigolDS1054Z::new(transport, limits);

        let capture = scope
            .acquire(&AcquisitionRequest::of(AnalogChannel::Chan1).from_memory())
            .unwrap();

        assert_eq!(capture.len(), 4);
        assert!(log.sent().contains(&":WAV:STOP 4".to_string()));
    }

    #[test]
    fn test_acquire_rejects_before_sending() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        let mut scope = scope(transport);

        let math_max = AcquisitionRequest::of(AnalogChannel::Chan1)
            .and(WaveformSource::Math)
            .from_max();
        assert!(matches!(
            scope.acquire(&math_max),
            Err(InstrumentError::Validation(_))
        ));
        let ascii = AcquisitionRequest::of(AnalogChannel::Chan1).format(DataFormat::Ascii);
        assert!(matches!(
            scope.acquire(&ascii),
            Err(InstrumentError::Validation(_))
        ));
        let too_deep = AcquisitionRequest::of(AnalogChannel::Chan1)
            .from_memory()
            .points(48_000_000);
        assert!(matches!(
            scope.acquire(&too_deep),
            Err(InstrumentError::Validation(_))
        ));
        assert!(log.sent().is_empty());
    }

    #[test]
    fn test_acquire_mismatched_lengths() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50, 100])
            .with_reply(":WAV:PRE?", PREAMBLE)
            .with_block(":WAV:DATA?", &[0, 50]);
        let mut scope = scope(transport);

        let request = AcquisitionRequest::of(AnalogChannel::Chan1).and(AnalogChannel::Chan2);
        assert!(matches!(
            scope.acquire(&request),
            Err(InstrumentError::Conversion(_))
        ));
    }

    #[test]
    fn test_acquisition_commands() {
        let transport = LoopbackTransport::new()
            .with_reply(":ACQ:AVER?", "16")
            .with_reply(":ACQ:MDEP?", "AUTO")
            .with_reply(":ACQ:TYPE?", "HRES")
            .with_reply(":ACQ:SRAT?", "1.000000e+09")
            .with_reply("*ESR?", "32");
        let log = transport.log();
        let mut scope = scope(transport);

        scope.set_averages(16).unwrap();
        assert!(matches!(
            scope.set_averages(3),
            Err(InstrumentError::Validation(_))
        ));
        scope.set_memory_depth(MemoryDepth::Points(1_200_000)).unwrap();
        assert!(scope.set_memory_depth(MemoryDepth::Points(1_000)).is_err());
        scope.set_acquisition_mode(AcquisitionMode::Peak).unwrap();
        scope.stop().unwrap();
        scope.force_trigger().unwrap();

        assert_eq!(scope.averages().unwrap(), 16);
        assert_eq!(scope.memory_depth().unwrap(), MemoryDepth::Auto);
        assert_eq!(
            scope.acquisition_mode().unwrap(),
            AcquisitionMode::HighResolution
        );
        assert!((scope.sample_rate().unwrap() - 1e9).abs() < 1.0);
        assert_eq!(scope.event_register().unwrap(), 32);

        assert_eq!(
            &log.sent()[..5],
            &[
                ":ACQ:AVER 16",
                ":ACQ:MDEP 1200000",
                ":ACQ:TYPE PEAK",
                ":STOP",
                ":TFOR",
            ]
        );
    }

    #[test]
    fn test_waveform_queries() {
        let transport = LoopbackTransport::new()
            .with_reply(":WAV:SOUR?", "D12")
            .with_reply(":WAV:MODE?", "RAW")
            .with_reply(":WAV:FORM?", "WORD")
            .with_reply("*IDN?", "RIGOL TECHNOLOGIES,DS1054Z,DS1ZA000000000,00.04.04.SP3\n");
        let mut scope = scope(transport);

        assert_eq!(
            scope.waveform_source().unwrap(),
            WaveformSource::Digital(DigitalChannel::new(12).unwrap())
        );
        assert_eq!(scope.read_mode().unwrap(), ReadMode::Raw);
        assert_eq!(scope.data_format().unwrap(), DataFormat::Word);
        assert!(scope.identify().unwrap().starts_with("RIGOL TECHNOLOGIES,DS1054Z"));
    }

    #[test]
    fn test_close_once() {
        let transport = LoopbackTransport::new();
        let log = transport.log();
        scope(transport).close().unwrap();
        assert_eq!(log.close_count(), 1);

        let transport = LoopbackTransport::new();
        let log = transport.log();
        drop(scope(transport));
        assert_eq!(log.close_count(), 1);
    }
}
