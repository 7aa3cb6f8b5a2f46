// Multimeter example
//
// Clears the status of a Fluke 8846A on its raw socket and prints a few settings and a reading.

use scpi_bench::{Fluke8846A, TransportConfig};

const RESOURCE: &str = "TCPIP::169.254.1.2::3490::SOCKET";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = TransportConfig::default().with_terminator("\n");
    let mut meter = Fluke8846A::connect(RESOURCE, Some(config))?;
    println!("Connected to {}", meter.identify()?);

    meter.clear_status()?;
    println!("2-wire resistance range: {} Ohm", meter.resistance_range()?);

    meter.configure_dc_voltage("DEF", "MIN")?;
    meter.set_dc_voltage_nplc(10)?;
    for reading in meter.read()? {
        println!("DC voltage: {:+.6} V", reading);
    }

    meter.close()?;
    Ok(())
}
