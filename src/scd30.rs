//! Sensirion SCD30 CO2, temperature and humidity sensor driver.
//!
//! Commands are 2-byte big-endian opcodes, optionally followed by one
//! argument word and its CRC. Responses are sequences of 2-byte words, each
//! followed by its own CRC byte. See 'Interface Description Sensirion SCD30
//! Sensor Module' for the command set.

use crc_all::Crc;
use embedded_hal::i2c::I2c;

use crate::error::{Error, Result};
use crate::params::{Command, MEASUREMENT_INTERVAL_SECONDS, SCD30_ADDRESS};

// A data word on the wire: two bytes plus CRC.
const WORD_LEN: usize = 3;
// The measurement response is the longest one the sensor sends.
const MAX_WORDS: usize = 6;

/// Firmware version reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

/// One decoded measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// CO2 concentration in ppm.
    pub co2_ppm: f32,
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f32,
    /// Relative humidity in percent.
    pub humidity_percent: f32,
}

/// Computes the SCD30 CRC-8 (polynomial 0x31, init 0xFF, no reflection, no final XOR).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = Crc::<u8>::new(0x31, 8, 0xff, 0x00, false);
    crc.update(data);
    crc.finish()
}

/// Driver for an SCD30 attached to any `embedded-hal` I2C bus.
pub struct Scd30<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> Scd30<I2C> {
    /// Creates a driver talking to the default address `0x61`.
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, SCD30_ADDRESS)
    }

    /// Creates a driver talking to a custom address.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Consumes the driver and returns the owned bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Provides mutable access to the underlying bus.
    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }
}

impl<I2C, E> Scd30<I2C>
where
    I2C: I2c<Error = E>,
{
    // ==================================================================
    // == Framing =======================================================
    // ==================================================================
    /// Sends a bare opcode.
    pub fn command(&mut self, command: Command) -> Result<(), E> {
        trace!("scd30 command: {:?}", command);
        self.i2c.write(self.address, &command.opcode())?;
        Ok(())
    }

    /// Sends an opcode followed by one argument word and its CRC.
    pub fn command_write_word(&mut self, command: Command, value: u16) -> Result<(), E> {
        let [op_hi, op_lo] = command.opcode();
        let [hi, lo] = value.to_be_bytes();
        let frame = [op_hi, op_lo, hi, lo, crc8(&[hi, lo])];
        trace!("scd30 command: {:?}", frame);

        self.i2c.write(self.address, &frame)?;
        Ok(())
    }

    /// Sends an opcode and reads back one CRC-checked word.
    pub fn command_read_word(&mut self, command: Command) -> Result<u16, E> {
        let mut word = [0u16; 1];
        self.command_read_words(command, &mut word)?;
        Ok(word[0])
    }

    /// Sends an opcode and reads back `words.len()` CRC-checked words.
    ///
    /// Every CRC is checked before any word is stored; one mismatch fails the whole call.
    fn command_read_words(&mut self, command: Command, words: &mut [u16]) -> Result<(), E> {
        debug_assert!(words.len() <= MAX_WORDS);

        let mut buffer = [0u8; MAX_WORDS * WORD_LEN];
        let response = &mut buffer[..words.len() * WORD_LEN];

        self.i2c.write(self.address, &command.opcode())?;
        self.i2c.read(self.address, response)?;
        trace!("scd30 response: {:?}", response);

        for chunk in response.chunks_exact(WORD_LEN) {
            let ours = crc8(&chunk[..2]);
            if ours != chunk[2] {
                warn!("scd30 crc mismatch: got {}, expected {}", chunk[2], ours);
                return Err(Error::Crc);
            }
        }

        for (word, chunk) in words.iter_mut().zip(response.chunks_exact(WORD_LEN)) {
            *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(())
    }

    // ==================================================================
    // == Identification & Status =======================================
    // ==================================================================
    /// Restarts the sensor. It needs about two seconds before accepting commands.
    pub fn soft_reset(&mut self) -> Result<(), E> {
        self.command(Command::SoftReset)
    }

    /// Reads the firmware version.
    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, E> {
        let [major, minor] = self.command_read_word(Command::FirmwareVersion)?.to_be_bytes();
        Ok(FirmwareVersion { major, minor })
    }

    /// Reads the data-ready flag, surfacing bus and CRC errors.
    pub fn data_ready_status(&mut self) -> Result<bool, E> {
        Ok(self.command_read_word(Command::DataReady)? == 1)
    }

    /// Returns true only when the sensor reports a new measurement.
    ///
    /// Any failure reading the flag counts as not ready.
    pub fn data_ready(&mut self) -> bool {
        self.data_ready_status().unwrap_or(false)
    }

    // ==================================================================
    // == Measurement ===================================================
    // ==================================================================
    /// Starts continuous measurement with ambient pressure compensation in mbar.
    ///
    /// A pressure of 0 disables compensation.
    pub fn start_continuous_measurement(&mut self, pressure_mbar: u16) -> Result<(), E> {
        self.command_write_word(Command::StartContinuousMeasurement, pressure_mbar)
    }

    /// Stops continuous measurement.
    pub fn stop_continuous_measurement(&mut self) -> Result<(), E> {
        self.command(Command::StopContinuousMeasurement)
    }

    /// Reads CO2, temperature and humidity.
    ///
    /// A CO2 word pair of all zero bits means the sensor has nothing valid yet and
    /// is reported as [`Error::NotReady`].
    pub fn read_measurement(&mut self) -> Result<Measurement, E> {
        let mut words = [0u16; MAX_WORDS];
        self.command_read_words(Command::ReadMeasurement, &mut words)?;

        let float = |hi: u16, lo: u16| f32::from_bits((u32::from(hi) << 16) | u32::from(lo));
        let measurement = Measurement {
            co2_ppm: float(words[0], words[1]),
            temperature_celsius: float(words[2], words[3]),
            humidity_percent: float(words[4], words[5]),
        };

        if measurement.co2_ppm.to_bits() == 0 {
            return Err(Error::NotReady);
        }
        Ok(measurement)
    }

    // ==================================================================
    // == Parameters ====================================================
    // ==================================================================
    /// Sets the continuous measurement interval, 2 to 1800 seconds.
    pub fn set_measurement_interval(&mut self, seconds: u16) -> Result<(), E> {
        if !MEASUREMENT_INTERVAL_SECONDS.contains(&seconds) {
            warn!("measurement interval {} outside 2..=1800", seconds);
            return Err(Error::InvalidArgument);
        }
        self.command_write_word(Command::MeasurementInterval, seconds)
    }

    /// Reads the continuous measurement interval in seconds.
    pub fn measurement_interval(&mut self) -> Result<u16, E> {
        self.command_read_word(Command::MeasurementInterval)
    }

    /// Sets the altitude compensation in meters above sea level.
    pub fn set_altitude_compensation(&mut self, meters: u16) -> Result<(), E> {
        self.command_write_word(Command::AltitudeCompensation, meters)
    }

    /// Reads the altitude compensation in meters above sea level.
    pub fn altitude_compensation(&mut self) -> Result<u16, E> {
        self.command_read_word(Command::AltitudeCompensation)
    }

    /// Sets the temperature offset in units of 0.01 K.
    pub fn set_temperature_offset(&mut self, offset: u16) -> Result<(), E> {
        self.command_write_word(Command::TemperatureOffset, offset)
    }

    /// Reads the temperature offset in units of 0.01 K.
    pub fn temperature_offset(&mut self) -> Result<u16, E> {
        self.command_read_word(Command::TemperatureOffset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsc::Bsc;
    use crate::config::BscConfig;
    use crate::error::BscError;
    use crate::sim::{SimDevice, SimPeripheral};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x61;

    // CO2 = 400.0, T = 22.5, RH = 50.0.
    const MEASUREMENT: [u8; 18] = [
        0x43, 0xC8, 0xDB, 0x00, 0x00, 0x81, //
        0x41, 0xB4, 0x87, 0x00, 0x00, 0x81, //
        0x42, 0x48, 0x55, 0x00, 0x00, 0x81,
    ];

    fn nack() -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }

    fn sensor(expectations: &[I2cTransaction]) -> Scd30<I2cMock> {
        Scd30::new(I2cMock::new(expectations))
    }

    fn finish(sensor: Scd30<I2cMock>) {
        sensor.release().done();
    }

    #[test]
    fn crc_matches_reference_values() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
        assert_eq!(crc8(&[0x00, 0x02]), 0xE3);
        assert_eq!(crc8(&[0x00, 0x00]), 0x81);
    }

    #[test]
    fn crc_detects_every_single_bit_flip() {
        for word in [[0xBEu8, 0xEF], [0x00, 0x02], [0x43, 0xC8]] {
            let reference = crc8(&word);
            for bit in 0..16 {
                let mut flipped = word;
                flipped[bit / 8] ^= 1 << (bit % 8);
                assert_ne!(crc8(&flipped), reference, "bit {bit} of {word:?}");
            }
        }
    }

    #[test]
    fn read_measurement_decodes_fixture() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x03, 0x00]),
            I2cTransaction::read(ADDR, MEASUREMENT.to_vec()),
        ]);

        let measurement = scd.read_measurement().unwrap();
        assert_eq!(
            measurement,
            Measurement {
                co2_ppm: 400.0,
                temperature_celsius: 22.5,
                humidity_percent: 50.0,
            }
        );
        finish(scd);
    }

    #[test]
    fn read_measurement_rejects_any_corrupt_crc() {
        for crc_index in (2..18).step_by(3) {
            let mut response = MEASUREMENT;
            response[crc_index] ^= 0x01;
            let mut scd = sensor(&[
                I2cTransaction::write(ADDR, vec![0x03, 0x00]),
                I2cTransaction::read(ADDR, response.to_vec()),
            ]);

            assert_eq!(scd.read_measurement(), Err(Error::Crc), "crc byte {crc_index}");
            finish(scd);
        }
    }

    #[test]
    fn zero_co2_is_not_ready() {
        let mut response = MEASUREMENT;
        response[..6].copy_from_slice(&[0x00, 0x00, 0x81, 0x00, 0x00, 0x81]);
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x03, 0x00]),
            I2cTransaction::read(ADDR, response.to_vec()),
        ]);

        assert_eq!(scd.read_measurement(), Err(Error::NotReady));
        finish(scd);
    }

    #[test]
    fn negative_zero_co2_is_a_reading() {
        let mut response = MEASUREMENT;
        response[..6].copy_from_slice(&[0x80, 0x00, 0xA2, 0x00, 0x00, 0x81]);
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x03, 0x00]),
            I2cTransaction::read(ADDR, response.to_vec()),
        ]);

        let measurement = scd.read_measurement().unwrap();
        assert_eq!(measurement.co2_ppm.to_bits(), 0x8000_0000);
        assert_eq!(measurement.temperature_celsius, 22.5);
        finish(scd);
    }

    #[test]
    fn data_ready_only_for_exactly_one() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, vec![0x00, 0x01, 0xB0]),
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, vec![0x00, 0x00, 0x81]),
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, vec![0x00, 0x03, 0xD2]),
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, vec![0x00, 0x01, 0x00]),
            I2cTransaction::write(ADDR, vec![0x02, 0x02]).with_error(nack()),
        ]);

        assert!(scd.data_ready());
        assert!(!scd.data_ready());
        assert!(!scd.data_ready());
        assert!(!scd.data_ready());
        assert!(!scd.data_ready());
        finish(scd);
    }

    #[test]
    fn data_ready_status_surfaces_errors() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, vec![0x00, 0x01, 0x00]),
        ]);

        assert_eq!(scd.data_ready_status(), Err(Error::Crc));
        finish(scd);
    }

    #[test]
    fn firmware_version_splits_word() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0xD1, 0x00]),
            I2cTransaction::read(ADDR, vec![0x03, 0x42, 0xF3]),
        ]);

        assert_eq!(scd.firmware_version(), Ok(FirmwareVersion { major: 3, minor: 0x42 }));
        finish(scd);
    }

    #[test]
    fn parameter_getters_read_one_word() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x46, 0x00]),
            I2cTransaction::read(ADDR, vec![0x00, 0x02, 0xE3]),
            I2cTransaction::write(ADDR, vec![0x51, 0x02]),
            I2cTransaction::read(ADDR, vec![0x01, 0xA4, 0x4D]),
            I2cTransaction::write(ADDR, vec![0x54, 0x03]),
            I2cTransaction::read(ADDR, vec![0x00, 0x00, 0x81]),
        ]);

        assert_eq!(scd.measurement_interval(), Ok(2));
        assert_eq!(scd.altitude_compensation(), Ok(420));
        assert_eq!(scd.temperature_offset(), Ok(0));
        finish(scd);
    }

    #[test]
    fn measurement_interval_bounds_are_checked_before_io() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0x46, 0x00, 0x00, 0x02, 0xE3]),
            I2cTransaction::write(ADDR, vec![0x46, 0x00, 0x07, 0x08, 0x96]),
        ]);

        assert_eq!(scd.set_measurement_interval(1), Err(Error::InvalidArgument));
        assert_eq!(scd.set_measurement_interval(1801), Err(Error::InvalidArgument));
        assert_eq!(scd.set_measurement_interval(2), Ok(()));
        assert_eq!(scd.set_measurement_interval(1800), Ok(()));
        finish(scd);
    }

    #[test]
    fn setup_sequence_frames_commands() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0xD3, 0x04]),
            I2cTransaction::write(ADDR, vec![0x51, 0x02, 0x01, 0xA4, 0x4D]),
            I2cTransaction::write(ADDR, vec![0x46, 0x00, 0x00, 0x02, 0xE3]),
            I2cTransaction::write(ADDR, vec![0x00, 0x10, 0x00, 0x00, 0x81]),
            I2cTransaction::write(ADDR, vec![0x54, 0x03, 0x00, 0x00, 0x81]),
            I2cTransaction::write(ADDR, vec![0x01, 0x04]),
        ]);

        scd.soft_reset().unwrap();
        scd.set_altitude_compensation(420).unwrap();
        scd.set_measurement_interval(2).unwrap();
        scd.start_continuous_measurement(0).unwrap();
        scd.set_temperature_offset(0).unwrap();
        scd.stop_continuous_measurement().unwrap();
        finish(scd);
    }

    #[test]
    fn bus_errors_are_returned_not_retried() {
        let mut scd = sensor(&[
            I2cTransaction::write(ADDR, vec![0xD3, 0x04]).with_error(nack()),
            I2cTransaction::write(ADDR, vec![0x51, 0x02, 0x01, 0xA4, 0x4D]).with_error(nack()),
        ]);

        assert_eq!(scd.soft_reset(), Err(Error::Interface(nack())));
        assert_eq!(scd.set_altitude_compensation(420), Err(Error::Interface(nack())));
        finish(scd);
    }

    fn simulated(device: SimDevice) -> Scd30<Bsc<SimPeripheral>> {
        let mut bsc = Bsc::new(SimPeripheral::new(device), BscConfig::default());
        bsc.init().unwrap();
        Scd30::new(bsc)
    }

    #[test]
    fn setup_sequence_over_simulated_bus() {
        let mut scd = simulated(SimDevice::new(ADDR));

        scd.soft_reset().unwrap();
        scd.set_altitude_compensation(420).unwrap();
        scd.set_measurement_interval(2).unwrap();
        scd.start_continuous_measurement(0).unwrap();

        let (sim, _) = scd.release().release();
        assert_eq!(
            sim.frames,
            vec![
                vec![0xD3, 0x04],
                vec![0x51, 0x02, 0x01, 0xA4, 0x4D],
                vec![0x46, 0x00, 0x00, 0x02, 0xE3],
                vec![0x00, 0x10, 0x00, 0x00, 0x81],
            ]
        );
    }

    #[test]
    fn setup_sequence_fails_cleanly_on_nack() {
        let mut device = SimDevice::new(ADDR);
        device.nack = true;
        let mut scd = simulated(device);

        assert_eq!(scd.soft_reset(), Err(Error::Interface(BscError::Ack)));
        assert_eq!(scd.set_altitude_compensation(420), Err(Error::Interface(BscError::Ack)));
        assert_eq!(scd.set_measurement_interval(2), Err(Error::Interface(BscError::Ack)));
        assert_eq!(scd.start_continuous_measurement(0), Err(Error::Interface(BscError::Ack)));
        assert!(!scd.data_ready());
    }

    #[test]
    fn measurement_over_simulated_bus() {
        let mut device = SimDevice::new(ADDR)
            .respond([0x02, 0x02], &[0x00, 0x01, 0xB0])
            .respond([0x03, 0x00], &MEASUREMENT);
        device.trailing = 4;
        let mut scd = simulated(device);

        assert!(scd.data_ready());
        let measurement = scd.read_measurement().unwrap();
        assert_eq!(measurement.co2_ppm, 400.0);
        assert_eq!(measurement.temperature_celsius, 22.5);
        assert_eq!(measurement.humidity_percent, 50.0);
    }

    #[test]
    fn short_response_over_simulated_bus_is_an_error() {
        let device = SimDevice::new(ADDR).respond([0x03, 0x00], &MEASUREMENT[..9]);
        let mut scd = simulated(device);

        assert_eq!(
            scd.read_measurement(),
            Err(Error::Interface(BscError::ShortRead { expected: 18, actual: 9 }))
        );
    }
}
