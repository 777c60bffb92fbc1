//! `/dev/mem` backed register window.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;

use memmap2::{MmapMut, MmapOptions};

use super::RegisterInterface;
use crate::registers::MIN_WINDOW_LEN;

const DEV_MEM: &str = "/dev/mem";
const SOC_RANGES: &str = "/proc/device-tree/soc/ranges";

// Used by the platform library when the device tree is unavailable.
const FALLBACK_BASE: u64 = 0x2000_0000;
const FALLBACK_LEN: usize = 0x0100_0000;

/// Physical location of the SoC peripheral window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralRange {
    /// Physical base address.
    pub base: u64,
    /// Window length in bytes.
    pub len: usize,
}

impl PeripheralRange {
    /// Creates a range from an explicit base address and length.
    pub const fn new(base: u64, len: usize) -> Self {
        Self { base, len }
    }

    /// Reads the peripheral window from the device tree, falling back to the
    /// BCM2835 defaults when it cannot be read.
    pub fn discover() -> Self {
        Self::from_device_tree(SOC_RANGES).unwrap_or(Self::new(FALLBACK_BASE, FALLBACK_LEN))
    }

    /// Parses a `soc/ranges` property file.
    pub fn from_device_tree(path: impl AsRef<Path>) -> Option<Self> {
        let ranges = fs::read(path).ok()?;
        Self::parse_ranges(&ranges)
    }

    /// Parses the raw big-endian cells of a `soc/ranges` property.
    ///
    /// The parent address sits in cell 1; SoCs with 64-bit parent addresses
    /// leave it zero and carry the low word in cell 2, shifting the size along.
    pub fn parse_ranges(ranges: &[u8]) -> Option<Self> {
        let cell = |index: usize| -> Option<u32> {
            let bytes = ranges.get(index * 4..index * 4 + 4)?;
            Some(u32::from_be_bytes(bytes.try_into().ok()?))
        };

        let (base, len) = match cell(1)? {
            0 => (cell(2)?, cell(3)?),
            base => (base, cell(2)?),
        };

        if base == 0 || len == 0 {
            return None;
        }

        Some(Self::new(u64::from(base), len as usize))
    }
}

/// Failure to acquire the peripheral mapping.
#[derive(Debug)]
pub enum MapError {
    /// `/dev/mem` could not be opened, usually a permission problem.
    Open(io::Error),
    /// `mmap` rejected the requested range.
    Map(io::Error),
    /// The window does not cover the GPIO and BSC1 register blocks.
    RangeTooSmall(usize),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(err) => write!(f, "failed to open {DEV_MEM}, try checking permissions: {err}"),
            Self::Map(err) => write!(f, "failed to map peripheral window: {err}"),
            Self::RangeTooSmall(len) => {
                write!(f, "peripheral window of {len:#x} bytes is smaller than {MIN_WINDOW_LEN:#x}")
            }
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(err) | Self::Map(err) => Some(err),
            Self::RangeTooSmall(_) => None,
        }
    }
}

/// Exclusive mapping of the peripheral window through `/dev/mem`.
///
/// The mapping is released when the value is dropped.
pub struct MappedPeripheral {
    map: MmapMut,
    words: usize,
}

impl MappedPeripheral {
    /// Maps `range` read/write with `O_SYNC` so accesses are uncached.
    pub fn map(range: PeripheralRange) -> Result<Self, MapError> {
        if range.len < MIN_WINDOW_LEN {
            return Err(MapError::RangeTooSmall(range.len));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_MEM)
            .map_err(MapError::Open)?;

        // SAFETY: the window is device memory owned by this process for the
        // lifetime of the mapping; it is only touched through volatile accesses.
        let map = unsafe { MmapOptions::new().offset(range.base).len(range.len).map_mut(&file) }
            .map_err(MapError::Map)?;

        debug!("mapped {} bytes of peripheral window at {}", range.len, range.base);

        Ok(Self {
            map,
            words: range.len / 4,
        })
    }

    /// Releases the mapping.
    pub fn unmap(self) {
        drop(self);
    }

    fn check_offset(&self, offset: usize) {
        assert!(offset < self.words, "register offset {offset:#x} outside mapped window");
    }
}

// The mapping is page aligned, so every word offset is 4-byte aligned.
impl RegisterInterface for MappedPeripheral {
    fn read_word(&mut self, offset: usize) -> u32 {
        self.check_offset(offset);
        let word = self.map.as_ptr().cast::<u32>();
        // SAFETY: the offset was checked against the live mapping.
        unsafe { ptr::read_volatile(word.add(offset)) }
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        self.check_offset(offset);
        let word = self.map.as_mut_ptr().cast::<u32>();
        // SAFETY: the offset was checked against the live, writable mapping.
        unsafe { ptr::write_volatile(word.add(offset), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }

    #[test]
    fn parses_32_bit_ranges() {
        let ranges = cells(&[0x7E00_0000, 0x3F00_0000, 0x0100_0000]);
        assert_eq!(
            PeripheralRange::parse_ranges(&ranges),
            Some(PeripheralRange::new(0x3F00_0000, 0x0100_0000))
        );
    }

    #[test]
    fn parses_64_bit_parent_ranges() {
        let ranges = cells(&[0x7E00_0000, 0x0000_0000, 0xFE00_0000, 0x0180_0000]);
        assert_eq!(
            PeripheralRange::parse_ranges(&ranges),
            Some(PeripheralRange::new(0xFE00_0000, 0x0180_0000))
        );
    }

    #[test]
    fn rejects_truncated_ranges() {
        assert_eq!(PeripheralRange::parse_ranges(&cells(&[0x7E00_0000])), None);
        assert_eq!(PeripheralRange::parse_ranges(&[]), None);
    }

    #[test]
    fn missing_device_tree_yields_none() {
        assert_eq!(PeripheralRange::from_device_tree("/nonexistent/soc/ranges"), None);
    }

    #[test]
    fn small_window_is_rejected_before_opening() {
        let err = MappedPeripheral::map(PeripheralRange::new(FALLBACK_BASE, 0x1000)).err();
        assert!(matches!(err, Some(MapError::RangeTooSmall(0x1000))));
    }
}
