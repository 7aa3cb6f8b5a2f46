// Calibration sweep example
//
// Steps the Fluke 9142 through a list of set points. At every stable point the Isotech 954 scans
// the eight thermometer inputs while the 8846A reads each probe's resistance.

use scpi_bench::{Fluke8846A, Fluke9142, Isotech954, RtdType, TransportConfig};
use std::thread;
use std::time::{Duration, Instant};

const WELL: &str = "ASRL/dev/ttyUSB0::INSTR";
const SWITCH: &str = "ASRL/dev/ttyUSB1::INSTR";
const METER: &str = "TCPIP::169.254.1.2::3490::SOCKET";

const SET_POINTS: [f64; 4] = [0.0, 25.0, 50.0, 100.0];
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut well = Fluke9142::connect(WELL, None)?;
    let mut switch = Isotech954::connect(SWITCH, None)?;
    let mut meter =
        Fluke8846A::connect(METER, Some(TransportConfig::default().with_terminator("\n")))?;

    println!("Dry-well: {}", well.identify()?);
    meter.configure_four_wire_temperature(RtdType::Pt100_385)?;
    well.set_stability_limit(0.05)?;
    well.set_output(true)?;

    for &set_point in &SET_POINTS {
        println!("\nSetting {:.2} °C", set_point);
        well.set_temperature(set_point)?;

        let start = Instant::now();
        while !well.is_stable()? {
            if start.elapsed() > SETTLE_TIMEOUT {
                eprintln!("Well did not settle at {:.2} °C, skipping", set_point);
                break;
            }
            thread::sleep(Duration::from_secs(10));
        }
        well.beep()?;

        let reference = well.reference_temperature()?;
        println!("Reference: {:.4} °C", reference);
        for channel in 1..=8 {
            switch.switch_to_channel(channel)?;
            thread::sleep(Duration::from_secs(2));
            let readings = meter.read()?;
            if let Some(value) = readings.first() {
                println!("  Probe {}: {:.4} °C ({:+.4})", channel, value, value - reference);
            }
        }
    }

    well.set_output(false)?;
    switch.close()?;
    meter.close()?;
    well.close()?;
    Ok(())
}
