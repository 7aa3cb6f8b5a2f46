// Memory capture example
//
// Stops the scope and reads the acquisition memory of one or more channels in chunks,
// then stores the converted capture as CSV.

use clap::Parser;
use scpi_bench::{AcquisitionRequest, DataFormat, RigolDS1054Z, TransportConfig, WaveformSource};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "memory_capture")]
#[command(version = "1.0")]
#[command(about = "Read the DS1054Z acquisition memory into a CSV file")]
struct Args {
    /// VISA resource of the scope
    #[arg(default_value = "TCPIP::192.168.123.2::INSTR")]
    resource: String,

    /// Channels to read, e.g. CHAN1 CHAN3
    #[arg(short, long, num_args = 1.., default_value = "CHAN1")]
    channels: Vec<String>,

    /// Memory points per channel; the preamble's point count if omitted
    #[arg(short, long)]
    points: Option<u64>,

    /// Points per :WAV:DATA? request
    #[arg(long, default_value_t = 125_000)]
    chunk_size: u64,

    /// Read 16 bit words instead of bytes
    #[arg(long)]
    word: bool,

    /// Output file
    #[arg(short, long, default_value = "capture.csv")]
    output: String,

    /// Per-exchange timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    #[cfg(feature = "cpu-profiling")]
    let _client = tracy_client::Client::start();

    let sources = args
        .channels
        .iter()
        .map(|c| c.parse::<WaveformSource>())
        .collect::<Result<Vec<_>, _>>()?;
    let Some((&first, rest)) = sources.split_first() else {
        eprintln!("No channels given");
        std::process::exit(1);
    };

    let config = TransportConfig::default()
        .with_terminator("\n")
        .with_delay(Duration::ZERO)
        .with_timeout(Duration::from_secs(args.timeout));
    let mut scope = RigolDS1054Z::connect(&args.resource, Some(config))?;
    println!("Connected to {}", scope.identify()?.trim());

    scope.stop()?;

    let mut request = rest
        .iter()
        .fold(AcquisitionRequest::of(first), |request, &source| {
            request.and(source)
        })
        .from_memory()
        .chunk_size(args.chunk_size);
    if let Some(points) = args.points {
        request = request.points(points);
    }
    if args.word {
        request = request.format(DataFormat::Word);
    }

    let start = Instant::now();
    let capture = scope.acquire(&request)?;
    let elapsed = start.elapsed();
    println!(
        "Read {} points from {} channel(s) in {:.2}s",
        capture.len(),
        request.sources().len(),
        elapsed.as_secs_f64()
    );

    capture.save_csv(&args.output)?;
    println!("Saved to {}", args.output);

    scope.close()?;
    Ok(())
}
