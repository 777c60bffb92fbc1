//! Blocking BSC1 (I2C master) driver.
//!
//! Every transfer busy-polls the status register on the calling thread until
//! the controller reports DONE, a NACK, or a clock-stretch timeout. There is no
//! software timeout, no retry and no locking: one [`Bsc`] owns one bus.

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

use crate::config::BscConfig;
use crate::error::BscError;
use crate::interface::RegisterInterface;
use crate::params::{PinFunction, SCL_PIN, SDA_PIN};
use crate::registers::{
    bsc_word, function_select_field, ClockDivider, ClockStretchTimeout, Control, DataDelay,
    DataLength, Fifo, Register, SlaveAddress, Status, CLEAR_FIFO, FIFO_DEPTH, MAX_CLOCK_DIVIDER,
};

#[cfg(feature = "std")]
use crate::interface::mmap::{MapError, MappedPeripheral, PeripheralRange};

// DLEN is 16 bits wide.
const MAX_READ_LEN: usize = u16::MAX as usize;
// CDIV value selecting the fastest clock the hardware supports.
const MIN_CLOCK_DIVIDER: u16 = 2;

/// Decoded view of the `S` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    /// S.RXD: the FIFO holds at least one received byte.
    pub data_ready: bool,
    /// S.RXF: the FIFO is full.
    pub fifo_full: bool,
    /// S.TXE: the FIFO has nothing left to send.
    pub fifo_empty: bool,
    /// S.CLKT: the slave stretched SCL past the timeout.
    pub clock_stretch_timeout: bool,
    /// S.ERR: the slave did not acknowledge.
    pub ack_error: bool,
    /// S.TA: a transfer is in progress.
    pub transfer_active: bool,
    /// S.DONE: the transfer completed.
    pub transfer_done: bool,
}

impl StatusSnapshot {
    /// Builds a snapshot from the raw `S` bitfield.
    pub fn from_register(status: Status) -> Self {
        Self {
            data_ready: status.rxd(),
            fifo_full: status.rxf(),
            fifo_empty: status.txe(),
            clock_stretch_timeout: status.clkt(),
            ack_error: status.err(),
            transfer_active: status.transfer_active(),
            transfer_done: status.done(),
        }
    }

    /// True once the current transfer can make no further progress.
    pub fn is_terminal(&self) -> bool {
        self.transfer_done || self.ack_error || self.clock_stretch_timeout
    }

    /// Classifies a terminal status. A NACK wins over a timeout.
    pub fn completion(&self) -> Result<(), BscError> {
        if self.ack_error {
            Err(BscError::Ack)
        } else if self.clock_stretch_timeout {
            Err(BscError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Blocking driver for the BSC1 controller.
pub struct Bsc<R> {
    regs: R,
    config: BscConfig,
}

impl<R> Bsc<R> {
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a new driver instance over the provided register window.
    ///
    /// Nothing is written until [`Bsc::init`] runs.
    pub fn new(regs: R, config: BscConfig) -> Self {
        Self { regs, config }
    }

    /// Consumes the driver and returns the owned register window.
    pub fn release(self) -> (R, BscConfig) {
        (self.regs, self.config)
    }

    /// Returns the configuration last applied through the setters.
    pub fn config(&self) -> &BscConfig {
        &self.config
    }

    /// Provides mutable access to the underlying register window.
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }
}

/// Failure to bring up a memory-mapped [`Bsc`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum OpenError {
    /// The peripheral window could not be mapped.
    Map(MapError),
    /// The controller rejected the configuration.
    Bsc(BscError),
}

#[cfg(feature = "std")]
impl core::fmt::Display for OpenError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Map(err) => core::fmt::Display::fmt(err, f),
            Self::Bsc(err) => core::fmt::Display::fmt(err, f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Map(err) => Some(err),
            Self::Bsc(err) => Some(err),
        }
    }
}

#[cfg(feature = "std")]
impl Bsc<MappedPeripheral> {
    // ==================================================================
    // == Memory-Mapped Lifecycle =======================================
    // ==================================================================
    /// Maps the peripheral window and initializes the controller.
    ///
    /// The mapping is dropped again if initialization fails.
    pub fn open(range: PeripheralRange, config: BscConfig) -> Result<Self, OpenError> {
        config.validate().map_err(|_| OpenError::Bsc(BscError::InvalidConfig))?;

        let regs = MappedPeripheral::map(range).map_err(OpenError::Map)?;
        let mut bsc = Self::new(regs, config);
        bsc.init().map_err(OpenError::Bsc)?;
        Ok(bsc)
    }

    /// Releases the peripheral mapping.
    pub fn close(self) {
        let (regs, _) = self.release();
        regs.unmap();
    }
}

impl<R: RegisterInterface> Bsc<R> {
    // ==================================================================
    // == Initialization & Configuration ================================
    // ==================================================================
    /// Routes SDA1/SCL1 to their pins and applies the stored configuration.
    pub fn init(&mut self) -> Result<(), BscError> {
        self.config.validate().map_err(|_| BscError::InvalidConfig)?;

        self.set_pin_function(SDA_PIN, PinFunction::Alt0);
        self.set_pin_function(SCL_PIN, PinFunction::Alt0);
        self.apply(self.config)?;

        debug!(
            "bsc ready: scl {} Hz, clkt {}",
            self.scl_frequency(),
            self.clock_timeout()
        );
        Ok(())
    }

    /// Applies a new configuration to the controller.
    pub fn configure(&mut self, config: BscConfig) -> Result<(), BscError> {
        config.validate().map_err(|_| BscError::InvalidConfig)?;
        self.apply(config)
    }

    // Expects a validated configuration.
    fn apply(&mut self, config: BscConfig) -> Result<(), BscError> {
        self.config.core_clock_hz = config.core_clock_hz;
        self.set_scl_frequency(config.scl_frequency_hz)?;
        self.set_clock_timeout(config.clock_timeout);
        self.set_slave_address(config.slave_address);
        Ok(())
    }

    /// Selects the function of one GPIO pin, leaving its neighbours untouched.
    pub fn set_pin_function(&mut self, pin: u8, function: PinFunction) {
        let (offset, shift) = function_select_field(pin);
        self.regs.set_masked_bits(offset, function.bits() << shift, 0b111 << shift);
    }

    /// Sets the 7-bit slave address; bit 7 is dropped.
    pub fn set_slave_address(&mut self, address: u8) {
        let address = address & 0x7F;
        self.write_register(SlaveAddress::new().with_addr(address));
        self.config.slave_address = address;
    }

    /// Returns the 7-bit slave address.
    pub fn slave_address(&mut self) -> u8 {
        self.read_register::<SlaveAddress>().addr() & 0x7F
    }

    /// Writes the raw clock divider. Odd values are rounded down.
    pub fn set_clock_divider(&mut self, cdiv: u16) {
        self.write_register(ClockDivider::new().with_cdiv(cdiv & 0xFFFE));
    }

    /// Returns the raw clock divider, 0 meaning 32768.
    pub fn clock_divider(&mut self) -> u16 {
        self.read_register::<ClockDivider>().cdiv()
    }

    /// Sets SCL to `core_clock / divider` with the divider rounded down to even.
    ///
    /// Frequencies needing a divider above 32768 fail with [`BscError::TooSlow`]
    /// and below 2 with [`BscError::TooFast`]; neither touches the hardware.
    pub fn set_scl_frequency(&mut self, hz: u32) -> Result<(), BscError> {
        if hz == 0 {
            return Err(BscError::TooSlow);
        }

        let divider = self.config.core_clock_hz / hz;
        if divider > MAX_CLOCK_DIVIDER {
            warn!("requested SCL frequency {} Hz is too low", hz);
            return Err(BscError::TooSlow);
        }
        if divider < u32::from(MIN_CLOCK_DIVIDER) {
            warn!("requested SCL frequency {} Hz is too high", hz);
            return Err(BscError::TooFast);
        }

        let cdiv = if divider == MAX_CLOCK_DIVIDER { 0 } else { divider as u16 };
        self.set_clock_divider(cdiv);
        self.config.scl_frequency_hz = hz;
        Ok(())
    }

    /// Returns the SCL frequency, rounded up when the divider does not divide the core clock.
    pub fn scl_frequency(&mut self) -> u32 {
        let divider = match self.clock_divider() {
            0 => MAX_CLOCK_DIVIDER,
            cdiv => u32::from(cdiv),
        };
        self.config.core_clock_hz.div_ceil(divider)
    }

    /// Selects the slowest clock (divider 32768).
    pub fn set_scl_frequency_to_minimum(&mut self) {
        self.set_clock_divider(0);
    }

    /// Selects the fastest clock (divider 2).
    pub fn set_scl_frequency_to_maximum(&mut self) {
        self.set_clock_divider(MIN_CLOCK_DIVIDER);
    }

    /// Sets the clock-stretch timeout in SCL cycles, 0 disables it.
    pub fn set_clock_timeout(&mut self, timeout: u16) {
        self.write_register(ClockStretchTimeout::new().with_tout(timeout));
        self.config.clock_timeout = timeout;
    }

    /// Returns the clock-stretch timeout.
    pub fn clock_timeout(&mut self) -> u16 {
        self.read_register::<ClockStretchTimeout>().tout()
    }

    /// Sets the falling and rising edge data delays, in core clocks.
    pub fn set_data_delay(&mut self, falling: u16, rising: u16) {
        self.write_register(DataDelay::new().with_fedl(falling).with_redl(rising));
    }

    /// Returns the `(falling, rising)` edge data delays.
    pub fn data_delay(&mut self) -> (u16, u16) {
        let delay = self.read_register::<DataDelay>();
        (delay.fedl(), delay.redl())
    }

    /// Reads and decodes the status register.
    pub fn status(&mut self) -> StatusSnapshot {
        StatusSnapshot::from_register(self.read_register::<Status>())
    }

    // ==================================================================
    // == Transfers =====================================================
    // ==================================================================
    /// Writes `bytes` to the current slave address.
    ///
    /// The whole buffer is staged in the FIFO before the transfer starts, so
    /// at most [`FIFO_DEPTH`] bytes can be sent at once.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, BscError> {
        if bytes.is_empty() || bytes.len() > FIFO_DEPTH {
            return Err(BscError::InvalidLength(bytes.len()));
        }
        trace!("bsc write request: {:?}", bytes);

        self.write_register(Control::new().with_clear(CLEAR_FIFO));
        for &byte in bytes {
            self.write_register(Fifo::new().with_data(byte));
        }
        self.write_register(DataLength::new().with_dlen(bytes.len() as u16));
        self.write_register(Status::clear_flags());
        self.write_register(Control::new().with_i2c_enable(true).with_start(true));

        let status = loop {
            let status = self.status();
            if status.is_terminal() {
                break status;
            }
        };

        if let Err(err) = status.completion() {
            warn!("bsc write failed: {:?}", err);
            return Err(err);
        }

        Ok(bytes.len())
    }

    /// Reads up to `buf.len()` bytes from the current slave address.
    ///
    /// Returns how many bytes arrived, which may be fewer than requested.
    /// A device sending more than `buf.len()` bytes aborts the transfer with
    /// [`BscError::BufferOverflow`]; nothing is ever stored past the slice.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, BscError> {
        if buf.is_empty() || buf.len() > MAX_READ_LEN {
            return Err(BscError::InvalidLength(buf.len()));
        }
        trace!("bsc read request: {}", buf.len());

        self.write_register(DataLength::new().with_dlen(buf.len() as u16));
        self.write_register(Status::clear_flags());
        self.write_register(
            Control::new()
                .with_i2c_enable(true)
                .with_start(true)
                .with_clear(CLEAR_FIFO)
                .with_read(true),
        );

        let mut count = 0;
        let status = loop {
            let status = self.status();
            if status.data_ready {
                self.drain_byte(buf, &mut count)?;
            }
            if status.is_terminal() {
                break status;
            }
        };

        if let Err(err) = status.completion() {
            warn!("bsc read failed: {:?}", err);
            return Err(err);
        }

        // DONE can be reported while received bytes are still queued.
        while self.status().data_ready {
            self.drain_byte(buf, &mut count)?;
        }

        if count < buf.len() {
            debug!("bsc partial read: {} of {}", count, buf.len());
        }
        Ok(count)
    }

    fn drain_byte(&mut self, buf: &mut [u8], count: &mut usize) -> Result<(), BscError> {
        let Some(slot) = buf.get_mut(*count) else {
            self.write_register(Control::new().with_clear(CLEAR_FIFO));
            warn!("bsc read: buffer overflow after {} bytes", *count);
            return Err(BscError::BufferOverflow);
        };

        *slot = self.read_register::<Fifo>().data();
        *count += 1;
        Ok(())
    }

    // ==================================================================
    // == Register Access ===============================================
    // ==================================================================
    fn read_register<Reg: Register>(&mut self) -> Reg {
        Reg::from(self.regs.read_word(bsc_word(Reg::ADDRESS)))
    }

    fn write_register<Reg: Register>(&mut self, value: Reg) {
        self.regs.write_word(bsc_word(Reg::ADDRESS), value.into());
    }
}

impl<R> ErrorType for Bsc<R> {
    type Error = BscError;
}

/// Each operation runs as its own transfer with a STOP in between; the BSC
/// cannot issue a repeated START from software.
impl<R: RegisterInterface> I2c<SevenBitAddress> for Bsc<R> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.set_slave_address(address);

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    self.write(bytes)?;
                }
                Operation::Read(buf) => {
                    let expected = buf.len();
                    let actual = self.read(buf)?;
                    if actual != expected {
                        return Err(BscError::ShortRead { expected, actual });
                    }
                }
            }
        }

        Ok(())
    }
}
