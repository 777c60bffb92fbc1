//! Configuration primitives for the BSC driver.

use crate::params::SCD30_ADDRESS;
use crate::registers::MAX_CLOCK_DIVIDER;

/// VideoCore core clock feeding the BSC divider on BCM283x parts.
pub const DEFAULT_CORE_CLOCK_HZ: u32 = 250_000_000;
/// Standard-mode I2C clock.
pub const DEFAULT_SCL_FREQUENCY_HZ: u32 = 100_000;
/// Hardware reset value of `CLKT.TOUT`.
pub const DEFAULT_CLOCK_TIMEOUT: u16 = 0x40;

/// User-facing configuration for the BSC controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BscConfig {
    /// Frequency of the clock the divider is applied to.
    pub core_clock_hz: u32,
    /// Requested SCL frequency.
    pub scl_frequency_hz: u32,
    /// Clock-stretch timeout in SCL cycles, 0 disables it.
    pub clock_timeout: u16,
    /// 7-bit address of the device to talk to.
    pub slave_address: u8,
}

impl BscConfig {
    /// Begins building a [`BscConfig`] using the builder pattern.
    pub fn new() -> BscConfigBuilder {
        BscConfigBuilder::new()
    }

    /// Checks the configuration against the controller's limits.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.core_clock_hz == 0 {
            return Err(ConfigError::ZeroCoreClock);
        }

        if self.scl_frequency_hz == 0 || self.core_clock_hz / self.scl_frequency_hz > MAX_CLOCK_DIVIDER {
            return Err(ConfigError::SclTooSlow);
        }

        if self.core_clock_hz / self.scl_frequency_hz < 2 {
            return Err(ConfigError::SclTooFast);
        }

        if self.slave_address > 0x7F {
            return Err(ConfigError::AddressOutOfRange);
        }

        Ok(())
    }
}

/// Builder for [`BscConfig`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct BscConfigBuilder {
    config: BscConfig,
}

impl BscConfigBuilder {
    /// Creates a new builder seeded with [`BscConfig::default()`].
    pub fn new() -> Self {
        Self {
            config: BscConfig::default(),
        }
    }

    /// Overrides the core clock frequency.
    pub fn core_clock_hz(mut self, hz: u32) -> Self {
        self.config.core_clock_hz = hz;
        self
    }

    /// Overrides the SCL frequency.
    pub fn scl_frequency_hz(mut self, hz: u32) -> Self {
        self.config.scl_frequency_hz = hz;
        self
    }

    /// Overrides the clock-stretch timeout.
    pub fn clock_timeout(mut self, timeout: u16) -> Self {
        self.config.clock_timeout = timeout;
        self
    }

    /// Overrides the slave address.
    pub fn slave_address(mut self, address: u8) -> Self {
        self.config.slave_address = address;
        self
    }

    /// Finalizes the builder and returns the [`BscConfig`].
    pub fn build(self) -> BscConfig {
        self.config
    }
}

impl Default for BscConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BscConfig {
    fn default() -> Self {
        Self {
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
            scl_frequency_hz: DEFAULT_SCL_FREQUENCY_HZ,
            clock_timeout: DEFAULT_CLOCK_TIMEOUT,
            slave_address: SCD30_ADDRESS,
        }
    }
}

/// Validation errors generated while verifying a [`BscConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Core clock frequency is zero.
    ZeroCoreClock,
    /// SCL frequency needs a divider above 32768.
    SclTooSlow,
    /// SCL frequency needs a divider below 2.
    SclTooFast,
    /// Slave address does not fit in 7 bits.
    AddressOutOfRange,
}
