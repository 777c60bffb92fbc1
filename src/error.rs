//! Error handling primitives for the BSC and SCD30 drivers.

use core::fmt;

/// Crate-wide result type alias for sensor operations.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the SCD30 driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Any error reported by the underlying I2C bus.
    Interface(E),
    /// A received word did not match its checksum byte.
    Crc,
    /// A parameter is outside the range accepted by the sensor.
    InvalidArgument,
    /// The sensor has not produced a valid measurement yet.
    NotReady,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Interface(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(err) => write!(f, "bus error: {err:?}"),
            Self::Crc => f.write_str("checksum mismatch"),
            Self::InvalidArgument => f.write_str("argument out of range"),
            Self::NotReady => f.write_str("no valid measurement available"),
        }
    }
}

/// Errors reported by the BSC bus controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BscError {
    /// The addressed device did not acknowledge.
    Ack,
    /// The device held SCL low longer than the clock-stretch timeout.
    Timeout,
    /// More bytes arrived than the caller declared room for.
    ///
    /// This is a caller/protocol mismatch and is not worth retrying.
    BufferOverflow,
    /// Transfer length is zero or exceeds what the controller can express.
    InvalidLength(usize),
    /// A read inside an I2C transaction returned fewer bytes than requested.
    ShortRead {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },
    /// Requested SCL frequency needs a divider above 32768.
    TooSlow,
    /// Requested SCL frequency needs a divider below 2.
    TooFast,
    /// The controller configuration failed validation.
    InvalidConfig,
}

impl fmt::Display for BscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("device did not acknowledge"),
            Self::Timeout => f.write_str("clock stretch timeout"),
            Self::BufferOverflow => f.write_str("receive buffer overflow"),
            Self::InvalidLength(len) => write!(f, "invalid transfer length {len}"),
            Self::ShortRead { expected, actual } => {
                write!(f, "short read: {actual} of {expected} bytes")
            }
            Self::TooSlow => f.write_str("requested SCL frequency is too low"),
            Self::TooFast => f.write_str("requested SCL frequency is too high"),
            Self::InvalidConfig => f.write_str("invalid controller configuration"),
        }
    }
}

impl embedded_hal::i2c::Error for BscError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            Self::Ack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Self::BufferOverflow => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BscError {}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}
