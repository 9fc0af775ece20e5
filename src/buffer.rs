//! Bounds-checked transfer buffers
//!
//! Both directions use a fixed-capacity buffer sized at compile time. Every
//! access that hands a window to the driver goes through a capacity check,
//! so an oversized request becomes [`TransferError::ExceedsCapacity`] before
//! the driver is ever called.

use crate::constants::{MAX_TRANSFER_LEN, PATTERN_LEN};
use crate::error::{TransferError, TransferResult};

/// Fixed-capacity byte buffer for one transfer direction
///
/// # Type Parameters
/// * `CAP` - Capacity in bytes (the maximum single-transfer length)
#[derive(Clone)]
pub struct TransferBuffer<const CAP: usize> {
    data: [u8; CAP],
}

/// Buffer used for outbound payloads
pub type TxBuffer = TransferBuffer<MAX_TRANSFER_LEN>;

/// Buffer used for inbound results
pub type RxBuffer = TransferBuffer<MAX_TRANSFER_LEN>;

impl<const CAP: usize> TransferBuffer<CAP> {
    /// Zeroed buffer. Const-compatible.
    pub const fn new() -> Self {
        Self { data: [0u8; CAP] }
    }

    /// Buffer whose leading bytes hold the incrementing test pattern
    /// (`buf[i] = i`, wrapping at 256).
    pub fn with_pattern() -> Self {
        let mut buffer = Self::new();
        let len = PATTERN_LEN.min(CAP);
        for (i, byte) in buffer.data[..len].iter_mut().enumerate() {
            *byte = i as u8;
        }
        buffer
    }

    /// Capacity in bytes
    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Validate a requested transfer length against the capacity.
    ///
    /// # Errors
    ///
    /// [`TransferError::ExceedsCapacity`] if `len > CAP`.
    pub fn check(&self, len: usize) -> TransferResult<usize> {
        if len > CAP {
            return Err(TransferError::ExceedsCapacity {
                requested: len,
                capacity: CAP,
            });
        }
        Ok(len)
    }

    /// The first `len` bytes, for a send.
    pub fn payload(&self, len: usize) -> TransferResult<&[u8]> {
        let len = self.check(len)?;
        Ok(&self.data[..len])
    }

    /// Writable window of `len` bytes, for a receive.
    pub fn window_mut(&mut self, len: usize) -> TransferResult<&mut [u8]> {
        let len = self.check(len)?;
        Ok(&mut self.data[..len])
    }

    /// Whole buffer contents
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Whole buffer contents, writable
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl<const CAP: usize> Default for TransferBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> core::fmt::Debug for TransferBuffer<CAP> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("capacity", &CAP)
            .finish_non_exhaustive()
    }
}
