use crate::command::{InstrumentError, Session};
use crate::transport::Transport;
use crate::waveform_config::DataFormat;

/// One bounded `:WAV:STAR`/`:WAV:STOP` window, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: u64,
    pub stop: u64,
}

impl Chunk {
    pub fn point_count(&self) -> u64 {
        self.stop - self.start + 1
    }
}

/// Tiles `[1, total_points]` with consecutive chunks of at most `chunk_size` points.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total_points: u64,
    chunk_size: u64,
    next_start: u64,
    next_index: usize,
    done: bool,
}

impl ChunkPlan {
    pub fn new(total_points: u64, chunk_size: u64) -> Result<Self, InstrumentError> {
        if chunk_size == 0 {
            return Err(InstrumentError::Validation(
                "chunk size must be at least one point".to_string(),
            ));
        }
        Ok(Self {
            total_points,
            chunk_size,
            next_start: 1,
            next_index: 0,
            done: total_points == 0,
        })
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    /// `ceil(total_points / chunk_size)`
    pub fn chunk_count(&self) -> usize {
        self.total_points.div_ceil(self.chunk_size) as usize
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let start = self.next_start;
        let stop = start
            .saturating_add(self.chunk_size - 1)
            .min(self.total_points);
        let chunk = Chunk {
            index: self.next_index,
            start,
            stop,
        };
        // The last chunk ends exactly at `total_points`, which may be `u64::MAX`.
        self.done = stop == self.total_points;
        self.next_start = stop.saturating_add(1);
        self.next_index += 1;
        Some(chunk)
    }
}

/// Sample codes in ascending memory order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSampleBuffer {
    format: DataFormat,
    samples: Vec<u16>,
}

impl RawSampleBuffer {
    pub fn new(format: DataFormat) -> Self {
        Self {
            format,
            samples: Vec::new(),
        }
    }

    /// Decode one binary block. WORD samples are little-endian byte pairs.
    pub fn from_block(format: DataFormat, data: &[u8]) -> Result<Self, InstrumentError> {
        let samples = match format {
            DataFormat::Byte => data.iter().map(|&b| u16::from(b)).collect(),
            DataFormat::Word => {
                if data.len() % 2 != 0 {
                    return Err(InstrumentError::Parse(format!(
                        "WORD block has odd length {}",
                        data.len()
                    )));
                }
                data.chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect()
            }
            DataFormat::Ascii => {
                return Err(InstrumentError::Validation(
                    "ASCII waveforms carry voltages, not sample codes".to_string(),
                ))
            }
        };
        Ok(Self { format, samples })
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn append(&mut self, mut other: Self) {
        self.samples.append(&mut other.samples);
    }
}

/// Read `plan` chunk by chunk through the `set_waveform_start`, `set_waveform_stop` and
/// `waveform_data` commands of the session's table.
///
/// Any failing chunk aborts the whole read.
#[tracing::instrument(level = "debug", skip(session, plan), fields(points = plan.total_points()))]
pub fn read_chunks<T: Transport>(
    session: &mut Session<T>,
    plan: ChunkPlan,
    format: DataFormat,
) -> Result<RawSampleBuffer, InstrumentError> {
    #[cfg(feature = "cpu-profiling")]
    let _span = tracy_client::span!("read_chunks");

    if format.sample_width().is_none() {
        return Err(InstrumentError::Validation(
            "memory reads need BYTE or WORD format".to_string(),
        ));
    }

    let chunk_count = plan.chunk_count();
    let mut buffer = RawSampleBuffer::new(format);
    for chunk in plan {
        log::debug!(
            "Reading chunk {}/{} (points {}..={})",
            chunk.index + 1,
            chunk_count,
            chunk.start,
            chunk.stop
        );
        let samples = read_chunk(session, chunk, format).map_err(|source| {
            log::debug!("Chunk {} failed: {}", chunk.index, source);
            InstrumentError::Transfer {
                chunk: chunk.index,
                start: chunk.start,
                stop: chunk.stop,
                source: Box::new(source),
            }
        })?;
        buffer.append(samples);
    }
    Ok(buffer)
}

fn read_chunk<T: Transport>(
    session: &mut Session<T>,
    chunk: Chunk,
    format: DataFormat,
) -> Result<RawSampleBuffer, InstrumentError> {
    session.execute("set_waveform_start", &[chunk.start.into()])?;
    session.execute("set_waveform_stop", &[chunk.stop.into()])?;
    let data = session.execute("waveform_data", &[])?.into_block()?;
    let samples = RawSampleBuffer::from_block(format, &data)?;
    if samples.len() as u64 != chunk.point_count() {
        return Err(InstrumentError::Parse(format!(
            "expected {} samples, received {}",
            chunk.point_count(),
            samples.len()
        )));
    }
    Ok(samples)
}
