//! # SCPI Bench
//!
//! Typed drivers for the SCPI instruments of a temperature calibration bench: a Rigol DS1054Z
//! oscilloscope, a Fluke 8846A multimeter, a Fluke 9142 dry-well calibrator and an Isotech 954
//! switch box.
//!
//! Instruments are addressed with VISA-style resource strings and spoken to over raw TCP
//! sockets or serial ports. Every command goes through a static command table, so arguments are
//! validated before anything is sent to the instrument.
//!
//! ## Features
//!
//! - **Waveform acquisition**: screen and chunked acquisition-memory reads from the DS1054Z
//! - **Unit conversion**: raw sample codes to volts and seconds using the waveform preamble
//! - **DataFrame output**: captures become `polars` frames and header-less CSV files
//! - **Bench instruments**: meter, dry-well and switch box drivers on the same command layer
//! - **Hardware-free testing**: [`LoopbackTransport`] replays scripted replies
//!
//! ## Examples
//!
//! ### Screen Capture
//!
//! ```rust,no_run
//! use scpi_bench::{AnalogChannel, RigolDS1054Z};
//!
//! let mut scope = RigolDS1054Z::connect("TCPIP::192.168.123.2::INSTR", None)?;
//! let waveform = scope.read_screen(AnalogChannel::Chan1.into())?;
//! let series = waveform.to_physical();
//! println!("Captured {} samples", series.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Memory Capture of Two Channels
//!
//! ```rust,no_run
//! use scpi_bench::{AcquisitionRequest, AnalogChannel, RigolDS1054Z};
//!
//! let mut scope = RigolDS1054Z::connect("TCPIP::192.168.123.2::INSTR", None)?;
//! scope.stop()?;
//!
//! let request = AcquisitionRequest::of(AnalogChannel::Chan1)
//!     .and(AnalogChannel::Chan2)
//!     .from_memory()
//!     .points(1_200_000);
//! let capture = scope.acquire(&request)?;
//! capture.save_csv("capture.csv")?;
//! scope.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Bench Instruments
//!
//! ```rust,no_run
//! use scpi_bench::{Fluke9142, Isotech954};
//!
//! let mut well = Fluke9142::connect("ASRL/dev/ttyUSB0::INSTR", None)?;
//! let mut switch = Isotech954::connect("ASRL/dev/ttyUSB1::INSTR", None)?;
//!
//! well.set_temperature(25.0)?;
//! well.set_output(true)?;
//! switch.switch_to_channel(3)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Testing Without Hardware
//!
//! ```rust
//! use scpi_bench::{Isotech954, LoopbackTransport};
//!
//! let transport = LoopbackTransport::new();
//! let log = transport.log();
//! let mut switch = Isotech954::new(transport);
//!
//! switch.switch_to_channel(5)?;
//! assert!(switch.switch_to_channel(9).is_err());
//! assert_eq!(log.sent(), vec!["C05"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod command;
pub mod conversion;
pub mod dry_well;
pub mod loopback;
pub mod memory_reader;
pub mod multimeter;
pub mod preamble;
pub mod resource;
pub mod rigol_scope;
pub mod switch_box;
pub mod transport;
pub mod waveform_config;

// Re-export the main types for convenience
pub use command::{Arg, InstrumentError, Session};

pub use conversion::{to_physical, Capture, ConversionError, PhysicalSeries};

pub use loopback::{LoopbackLog, LoopbackTransport};

pub use memory_reader::{ChunkPlan, RawSampleBuffer};

pub use preamble::WaveformPreamble;

pub use resource::{ConnectionError, InstrumentConnector};

pub use transport::{Transport, TransportConfig, TransportError};

pub use waveform_config::{
    AcquisitionMode, AcquisitionRequest, AnalogChannel, DataFormat, DigitalChannel, MemoryDepth,
    ReadMode, WaveformSource,
};

pub use rigol_scope::{ChannelState, RigolDS1054Z, ScopeLimits, WaveformData};

pub use multimeter::{Fluke8846A, RtdType, TriggerSource};

pub use dry_well::Fluke9142;

pub use switch_box::Isotech954;
