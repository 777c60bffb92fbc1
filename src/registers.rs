//! Register map definitions for the BCM283x BSC1 controller and GPIO function select.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

/// Byte offset of the GPIO register block inside the peripheral window.
pub const GPIO_BLOCK: usize = 0x20_0000;
/// Byte offset of the BSC1 register block inside the peripheral window.
pub const BSC1_BLOCK: usize = 0x80_4000;

/// Register address of `GPFSEL0`, relative to [`GPIO_BLOCK`].
pub const REG_GPFSEL0: usize = 0x00;

/// Register address of `C` (control).
pub const REG_C: usize = 0x00;
/// Register address of `S` (status).
pub const REG_S: usize = 0x04;
/// Register address of `DLEN` (data length).
pub const REG_DLEN: usize = 0x08;
/// Register address of `A` (slave address).
pub const REG_A: usize = 0x0C;
/// Register address of `FIFO`.
pub const REG_FIFO: usize = 0x10;
/// Register address of `DIV` (clock divider).
pub const REG_DIV: usize = 0x14;
/// Register address of `DEL` (data delay).
pub const REG_DEL: usize = 0x18;
/// Register address of `CLKT` (clock stretch timeout).
pub const REG_CLKT: usize = 0x1C;

/// Depth of the BSC transmit and receive FIFOs, in bytes.
pub const FIFO_DEPTH: usize = 16;
/// Largest clock divider the hardware can express; stored as `0`.
pub const MAX_CLOCK_DIVIDER: u32 = 32_768;

/// Value of `C.CLEAR` that flushes the FIFO.
pub const CLEAR_FIFO: u8 = 0b11;

/// Smallest peripheral window that covers both the GPIO and BSC1 blocks.
pub const MIN_WINDOW_LEN: usize = BSC1_BLOCK + REG_CLKT + 4;

/// Word offset of a BSC1 register inside the peripheral window.
pub const fn bsc_word(register: usize) -> usize {
    (BSC1_BLOCK + register) >> 2
}

/// Word offset of the `GPFSELn` register holding `pin`, plus the bit shift of its field.
pub const fn function_select_field(pin: u8) -> (usize, u32) {
    let register = REG_GPFSEL0 + (pin as usize / 10) * 4;
    let shift = (pin as u32 % 10) * 3;
    ((GPIO_BLOCK + register) >> 2, shift)
}

/// Access permissions encoded for each register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// Read/write register.
    ReadWrite,
    /// Read register, write-1-to-clear flags.
    ReadClear,
}

/// Minimal metadata exposed by every BSC register value type.
pub trait Register: Copy + From<u32> + Into<u32> {
    /// Byte offset from the start of the BSC block.
    const ADDRESS: usize;
    /// Access permission classification.
    const ACCESS: RegisterAccess;
    /// Reset value documented in the peripheral manual.
    const RESET_VALUE: u32;
}

macro_rules! word_register {
    ($name:ident, $address:expr, $access:expr, $reset:expr, $mask:expr) => {
        impl From<u32> for $name {
            // Reserved bits read as zero.
            fn from(value: u32) -> Self {
                Self::from_bytes((value & $mask).to_le_bytes())
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                u32::from_le_bytes(value.into_bytes())
            }
        }

        impl Register for $name {
            const ADDRESS: usize = $address;
            const ACCESS: RegisterAccess = $access;
            const RESET_VALUE: u32 = $reset;
        }
    };
}

/// Bitfield representation of the `C` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    // Read transfer (bit 0).
    pub read: bool,
    #[skip]
    __: B3,
    // FIFO clear (bits 5:4).
    pub clear: B2,
    #[skip]
    __: B1,
    // Start transfer (bit 7).
    pub start: bool,
    // Interrupt on done (bit 8).
    pub intd: bool,
    // Interrupt on TX (bit 9).
    pub intt: bool,
    // Interrupt on RX (bit 10).
    pub intr: bool,
    #[skip]
    __: B4,
    // Controller enable (bit 15).
    pub i2c_enable: bool,
    #[skip]
    __: B16,
}

word_register!(Control, REG_C, RegisterAccess::ReadWrite, 0x0000_0000, 0x0000_87B1);

/// Bitfield representation of the `S` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    // Transfer active (bit 0).
    pub transfer_active: bool,
    // Transfer done (bit 1), write 1 to clear.
    pub done: bool,
    // FIFO needs writing (bit 2).
    pub txw: bool,
    // FIFO needs reading (bit 3).
    pub rxr: bool,
    // FIFO can accept data (bit 4).
    pub txd: bool,
    // FIFO contains data (bit 5).
    pub rxd: bool,
    // FIFO empty (bit 6).
    pub txe: bool,
    // FIFO full (bit 7).
    pub rxf: bool,
    // Slave did not acknowledge (bit 8), write 1 to clear.
    pub err: bool,
    // Clock stretch timeout (bit 9), write 1 to clear.
    pub clkt: bool,
    #[skip]
    __: B22,
}

word_register!(Status, REG_S, RegisterAccess::ReadClear, 0x0000_0050, 0x0000_03FF);

impl Status {
    /// Value that clears every write-1-to-clear flag.
    pub fn clear_flags() -> Self {
        Self::new().with_clkt(true).with_err(true).with_done(true)
    }
}

/// Bitfield representation of the `DLEN` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLength {
    pub dlen: B16,
    #[skip]
    __: B16,
}

word_register!(DataLength, REG_DLEN, RegisterAccess::ReadWrite, 0x0000_0000, 0x0000_FFFF);

/// Bitfield representation of the `A` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveAddress {
    pub addr: B7,
    #[skip]
    __: B25,
}

word_register!(SlaveAddress, REG_A, RegisterAccess::ReadWrite, 0x0000_0000, 0x0000_007F);

/// Bitfield representation of the `FIFO` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fifo {
    pub data: B8,
    #[skip]
    __: B24,
}

word_register!(Fifo, REG_FIFO, RegisterAccess::ReadWrite, 0x0000_0000, 0x0000_00FF);

/// Bitfield representation of the `DIV` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider {
    // Core clock divider, 0 means 32768. Hardware ignores bit 0.
    pub cdiv: B16,
    #[skip]
    __: B16,
}

word_register!(ClockDivider, REG_DIV, RegisterAccess::ReadWrite, 0x0000_05DC, 0x0000_FFFF);

/// Bitfield representation of the `DEL` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDelay {
    // Rising edge delay in core clocks (bits 15:0).
    pub redl: B16,
    // Falling edge delay in core clocks (bits 31:16).
    pub fedl: B16,
}

word_register!(DataDelay, REG_DEL, RegisterAccess::ReadWrite, 0x0030_0030, 0xFFFF_FFFF);

/// Bitfield representation of the `CLKT` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStretchTimeout {
    // Timeout in SCL cycles, 0 disables it.
    pub tout: B16,
    #[skip]
    __: B16,
}

word_register!(ClockStretchTimeout, REG_CLKT, RegisterAccess::ReadWrite, 0x0000_0040, 0x0000_FFFF);
