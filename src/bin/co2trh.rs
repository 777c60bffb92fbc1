//! Prints one `CO2 temperature humidity` sample from an SCD30 on BSC1.
//!
//! Exits with status 1 when the bus cannot be opened, the sensor rejects its
//! setup, or no measurement arrives in time.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use bsc_scd30::interface::mmap::{MappedPeripheral, PeripheralRange};
use bsc_scd30::{Bsc, BscConfig, BscError, Error, Measurement, Result, Scd30};

const SCL_FREQUENCY_HZ: u32 = 10_000;
const CLOCK_TIMEOUT: u16 = 2500;
const ALTITUDE_METERS: u16 = 420;
const MEASUREMENT_INTERVAL_SECONDS: u16 = 2;
// Ambient pressure compensation disabled.
const PRESSURE_MBAR: u16 = 0;

const RESET_DELAY: Duration = Duration::from_secs(2);
const POLL_DELAY: Duration = Duration::from_secs(1);
const POLL_ATTEMPTS: usize = 30;

fn main() -> ExitCode {
    let config = BscConfig::new()
        .scl_frequency_hz(SCL_FREQUENCY_HZ)
        .clock_timeout(CLOCK_TIMEOUT)
        .build();

    let bsc = match Bsc::open(PeripheralRange::discover(), config) {
        Ok(bsc) => bsc,
        Err(err) => {
            eprintln!("co2trh: failed to initialize I2C: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut sensor = Scd30::new(bsc);
    let outcome = measure(&mut sensor);
    sensor.release().close();

    match outcome {
        Ok(Some(measurement)) => {
            println!(
                "{:.1} {:.1} {:.1}",
                measurement.co2_ppm, measurement.temperature_celsius, measurement.humidity_percent
            );
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("co2trh: no measurement after {POLL_ATTEMPTS} attempts");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("co2trh: sensor setup failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn measure(sensor: &mut Scd30<Bsc<MappedPeripheral>>) -> Result<Option<Measurement>, BscError> {
    sensor.soft_reset()?;
    thread::sleep(RESET_DELAY);

    sensor.set_altitude_compensation(ALTITUDE_METERS)?;
    sensor.set_measurement_interval(MEASUREMENT_INTERVAL_SECONDS)?;
    sensor.start_continuous_measurement(PRESSURE_MBAR)?;

    for _ in 0..POLL_ATTEMPTS {
        if sensor.data_ready() {
            match sensor.read_measurement() {
                Ok(measurement) => return Ok(Some(measurement)),
                Err(Error::NotReady) => {}
                Err(err) => eprintln!("co2trh: measurement: {err}"),
            }
        }
        thread::sleep(POLL_DELAY);
    }

    Ok(None)
}
