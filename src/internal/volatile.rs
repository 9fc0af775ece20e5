//! Volatile access to mapped registers
//!
//! All register access is volatile to ensure proper hardware interaction.

/// Read a 32-bit register at the given address
///
/// # Safety
/// The caller must ensure the address is valid, mapped and properly aligned.
#[inline(always)]
pub(crate) unsafe fn read_reg(addr: *const u32) -> u32 {
    unsafe { core::ptr::read_volatile(addr) }
}

/// Write a 32-bit value to a register at the given address
///
/// # Safety
/// The caller must ensure the address is valid, mapped and properly aligned.
#[inline(always)]
pub(crate) unsafe fn write_reg(addr: *mut u32, value: u32) {
    unsafe { core::ptr::write_volatile(addr, value) }
}
