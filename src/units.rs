//! Byte / MiB conversions used by the size flags and the startup banner

use crate::constants::BYTES_PER_MIB;

/// Convert MiB to whole bytes, truncating any fraction of a byte
pub fn mib_to_bytes(mib: f64) -> usize {
    (mib * BYTES_PER_MIB) as usize
}

/// Convert bytes to MiB
pub fn bytes_to_mib(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}
