//! Register blocks
//!
//! [`RegisterBlock`] is a 32-bit register window addressed by byte offset.
//! [`MappedRegion`] maps a physical window through `/dev/mem`;
//! [`MemoryRegion`] is a plain in-memory window for the loopback engine and
//! for tests.

use core::ffi::c_void;
use core::ptr::null_mut;

use log::{debug, warn};
use rustix::fs::{Mode, OFlags, open};
use rustix::mm::{MapFlags, ProtFlags, mmap, munmap};

use crate::constants::MMIO_PAGE_SIZE;
use crate::error::{DeviceError, DeviceResult};
use crate::internal::volatile::{read_reg, write_reg};

/// A window of 32-bit registers addressed by byte offset
pub trait RegisterBlock {
    /// Read the register at `offset`
    fn read32(&self, offset: usize) -> u32;

    /// Write the register at `offset`
    fn write32(&mut self, offset: usize, value: u32);

    /// Read-modify-write the register at `offset`
    fn modify32<F>(&mut self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read32(offset);
        self.write32(offset, f(value));
    }

    /// Set bits in the register at `offset`
    fn set_bits(&mut self, offset: usize, bits: u32) {
        self.modify32(offset, |v| v | bits);
    }

    /// Clear bits in the register at `offset`
    fn clear_bits(&mut self, offset: usize, bits: u32) {
        self.modify32(offset, |v| v & !bits);
    }
}

fn check_offset(offset: usize, len: usize) {
    assert!(
        offset % 4 == 0 && offset + 4 <= len,
        "register offset 0x{offset:x} outside window of 0x{len:x} bytes"
    );
}

// =============================================================================
// Mapped Region
// =============================================================================

/// Physical register window mapped into the process.
///
/// Unmapped on drop.
#[derive(Debug)]
pub struct MappedRegion {
    base: *mut c_void,
    len: usize,
    phys: u64,
}

impl MappedRegion {
    /// Map `len` bytes at physical address `phys` through the memory device
    /// at `path` (normally `/dev/mem`).
    ///
    /// # Errors
    ///
    /// - [`DeviceError::MisalignedRegisters`] if `phys` is not page aligned
    /// - [`DeviceError::RegisterMap`] if opening or mapping fails
    pub fn map(path: &str, phys: u64, len: usize) -> DeviceResult<Self> {
        if phys % MMIO_PAGE_SIZE != 0 {
            return Err(DeviceError::MisalignedRegisters(phys));
        }
        let map_err = |source| DeviceError::RegisterMap { base: phys, source };

        let fd = open(
            path,
            OFlags::RDWR | OFlags::SYNC | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(map_err)?;

        // SAFETY: a fresh shared mapping of the device file; the kernel picks
        // the address and no existing Rust object aliases it.
        let base = unsafe {
            mmap(
                null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                phys,
            )
        }
        .map_err(map_err)?;

        debug!("mapped {len:#x} bytes of registers at {phys:#010x}");
        Ok(Self { base, len, phys })
    }

    /// Physical base address
    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Window length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl RegisterBlock for MappedRegion {
    fn read32(&self, offset: usize) -> u32 {
        check_offset(offset, self.len);
        // SAFETY: offset checked against the live mapping, 4-byte aligned.
        unsafe { read_reg(self.base.cast::<u8>().add(offset).cast::<u32>()) }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        check_offset(offset, self.len);
        // SAFETY: offset checked against the live mapping, 4-byte aligned.
        unsafe { write_reg(self.base.cast::<u8>().add(offset).cast::<u32>(), value) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` come from a successful mmap and are unmapped once.
        if let Err(err) = unsafe { munmap(self.base, self.len) } {
            warn!("munmap of register window at {:#010x} failed: {err}", self.phys);
        }
    }
}

// =============================================================================
// Memory Region
// =============================================================================

/// Register window backed by ordinary memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRegion {
    words: Vec<u32>,
    writes: usize,
}

impl MemoryRegion {
    /// Zeroed window of `len` bytes
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(4)],
            writes: 0,
        }
    }

    /// Number of register writes performed so far
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl RegisterBlock for MemoryRegion {
    fn read32(&self, offset: usize) -> u32 {
        check_offset(offset, self.words.len() * 4);
        self.words[offset / 4]
    }

    fn write32(&mut self, offset: usize, value: u32) {
        check_offset(offset, self.words.len() * 4);
        self.words[offset / 4] = value;
        self.writes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_region_starts_zeroed() {
        let regs = MemoryRegion::new(16);
        for offset in (0..16).step_by(4) {
            assert_eq!(regs.read32(offset), 0);
        }
        assert_eq!(regs.write_count(), 0);
    }

    #[test]
    fn set_and_clear_bits() {
        let mut regs = MemoryRegion::new(8);
        regs.write32(4, 0b1000);
        regs.set_bits(4, 0b0001);
        assert_eq!(regs.read32(4), 0b1001);
        regs.clear_bits(4, 0b1000);
        assert_eq!(regs.read32(4), 0b0001);
        assert_eq!(regs.read32(0), 0);
        assert_eq!(regs.write_count(), 3);
    }

    #[test]
    #[should_panic(expected = "outside window")]
    fn out_of_window_access_panics() {
        let regs = MemoryRegion::new(8);
        let _ = regs.read32(8);
    }

    #[test]
    #[should_panic(expected = "outside window")]
    fn unaligned_access_panics() {
        let mut regs = MemoryRegion::new(8);
        regs.write32(2, 1);
    }

    #[test]
    fn misaligned_base_is_rejected_before_open() {
        let err = MappedRegion::map("/nonexistent/mem", 0x4040_0010, 0x1000).unwrap_err();
        assert_eq!(err, DeviceError::MisalignedRegisters(0x4040_0010));
    }

    #[test]
    fn missing_memory_device_reports_register_map() {
        let err = MappedRegion::map("/nonexistent/mem", 0x4040_0000, 0x1000).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::RegisterMap {
                base: 0x4040_0000,
                ..
            }
        ));
    }
}
