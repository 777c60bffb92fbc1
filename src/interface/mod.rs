//! Register access abstraction for the BSC driver.

#[cfg(feature = "std")]
pub mod mmap;

/// Word-addressed, side-effecting access to a peripheral register window.
///
/// Offsets are in 32-bit words from the start of the window. Every access is a
/// single volatile load or store; implementations must not merge, reorder or
/// cache them. Offsets outside the window are a caller bug.
pub trait RegisterInterface {
    /// Reads one 32-bit register.
    ///
    /// Takes `&mut self` because reads such as popping the FIFO change device state.
    fn read_word(&mut self, offset: usize) -> u32;

    /// Writes one 32-bit register.
    fn write_word(&mut self, offset: usize, value: u32);

    /// Replaces the bits selected by `mask` with the same bits of `value`.
    fn set_masked_bits(&mut self, offset: usize, value: u32, mask: u32) {
        let current = self.read_word(offset);
        self.write_word(offset, (current & !mask) | (value & mask));
    }
}

impl<T: RegisterInterface + ?Sized> RegisterInterface for &mut T {
    fn read_word(&mut self, offset: usize) -> u32 {
        (**self).read_word(offset)
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        (**self).write_word(offset, value)
    }

    fn set_masked_bits(&mut self, offset: usize, value: u32, mask: u32) {
        (**self).set_masked_bits(offset, value, mask)
    }
}
