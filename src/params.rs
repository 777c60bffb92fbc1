//! Strongly typed parameters shared by the BSC and SCD30 drivers.
//!
//! These map directly to datasheet encodings. Prefer them over raw integers
//! so opcodes and pin functions stay explicit.
//!
//! # Examples
//!
//! ```rust
//! use bsc_scd30::params::{Command, PinFunction};
//!
//! assert_eq!(Command::ReadMeasurement.opcode(), [0x03, 0x00]);
//! assert_eq!(PinFunction::Alt0.bits(), 0b100);
//! ```

use core::ops::RangeInclusive;

/// GPIO pin carrying SDA1.
pub const SDA_PIN: u8 = 2;
/// GPIO pin carrying SCL1.
pub const SCL_PIN: u8 = 3;

/// Default 7-bit I2C address of the SCD30.
pub const SCD30_ADDRESS: u8 = 0x61;

/// Measurement intervals, in seconds, accepted by the SCD30.
pub const MEASUREMENT_INTERVAL_SECONDS: RangeInclusive<u16> = 2..=1800;

/// GPIO function select encodings (`GPFSELn` 3-bit fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinFunction {
    /// Plain input.
    Input = 0b000,
    /// Plain output.
    Output = 0b001,
    /// Alternate function 0 (SDA1/SCL1 on pins 2 and 3).
    Alt0 = 0b100,
    /// Alternate function 1.
    Alt1 = 0b101,
    /// Alternate function 2.
    Alt2 = 0b110,
    /// Alternate function 3.
    Alt3 = 0b111,
    /// Alternate function 4.
    Alt4 = 0b011,
    /// Alternate function 5.
    Alt5 = 0b010,
}

impl PinFunction {
    /// Returns the raw 3-bit field value.
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// SCD30 I2C commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Command {
    /// Start continuous measurement, argument is ambient pressure in mbar (0 disables).
    StartContinuousMeasurement = 0x0010,
    /// Stop continuous measurement.
    StopContinuousMeasurement = 0x0104,
    /// Get data ready status.
    DataReady = 0x0202,
    /// Read measurement.
    ReadMeasurement = 0x0300,
    /// Set or get the measurement interval.
    MeasurementInterval = 0x4600,
    /// Set or get the altitude compensation.
    AltitudeCompensation = 0x5102,
    /// Set or get the temperature offset.
    TemperatureOffset = 0x5403,
    /// Read the firmware version.
    FirmwareVersion = 0xD100,
    /// Soft reset.
    SoftReset = 0xD304,
}

impl Command {
    /// Returns the opcode as it goes on the wire.
    pub const fn opcode(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }
}
