// Screen capture example
//
// Reads the waveform displayed for CHAN1, converts it to volts and writes it to a CSV file.

use scpi_bench::{AnalogChannel, Capture, RigolDS1054Z};

const RESOURCE: &str = "TCPIP::192.168.123.2::INSTR";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Rigol DS1054Z Screen Capture");
    println!("============================\n");

    let mut scope = RigolDS1054Z::connect(RESOURCE, None)?;
    println!("Connected to {}", scope.identify()?.trim());

    let waveform = scope.read_screen(AnalogChannel::Chan1.into())?;
    let preamble = waveform.preamble;
    println!(
        "Read {} samples ({:.3e} s/point, {:.3e} V/code)",
        waveform.samples.len(),
        preamble.x_increment,
        preamble.y_increment
    );

    let capture = Capture::from_series("CHAN1", waveform.to_physical());
    capture.save_csv("test.csv")?;
    println!("Saved to test.csv");

    scope.close()?;
    Ok(())
}
