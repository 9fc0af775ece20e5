//! Centralized Constants
//!
//! This module provides a single source of truth for the magic numbers used
//! throughout the transfer core.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Buffer sizes**: Transfer buffer capacity and test pattern length
//! - **Transmit schedule**: Default payload sizes and settling interval
//! - **Receive loop**: Poll timeout and fault threshold
//! - **Control registers**: Physical window and enable bit
//! - **Units**: Byte/MiB conversion

// =============================================================================
// Buffer Sizes
// =============================================================================

/// Maximum length of a single transfer, and the capacity of both buffers
pub const MAX_TRANSFER_LEN: usize = 2048;

/// Number of leading transmit-buffer bytes filled with the incrementing pattern
pub const PATTERN_LEN: usize = 2000;

/// Default receive size when none is given on the command line
pub const DEFAULT_OUTPUT_SIZE: usize = MAX_TRANSFER_LEN;

// =============================================================================
// Transmit Schedule
// =============================================================================

/// Payload lengths of the default transmit sequence, in send order
pub const DEFAULT_TRANSMIT_SIZES: [usize; 3] = [1000, 2000, 1800];

/// Pause between consecutive sends, in milliseconds
pub const DEFAULT_SETTLE_INTERVAL_MS: u32 = 5_000;

// =============================================================================
// Receive Loop
// =============================================================================

/// How long the loopback engine blocks in a receive before timing out
pub const RECEIVE_POLL_TIMEOUT_MS: u64 = 100;

/// How long shutdown waits for the receive thread before detaching it
pub const RX_JOIN_GRACE_MS: u64 = 1000;

/// Consecutive receive faults tolerated before the loop gives up
pub const MAX_CONSECUTIVE_RX_FAULTS: u32 = 8;

/// Bytes per row in the receive hex dump
pub const HEXDUMP_ROW_LEN: usize = 16;

// =============================================================================
// Control Registers
// =============================================================================

/// Device node used to map the control register window
pub const MEM_DEVICE_PATH: &str = "/dev/mem";

/// Physical base address of the DMA control register window
pub const CONTROL_REG_BASE: u64 = 0x4040_0000;

/// Size of the mapped control register window
pub const CONTROL_REG_SPAN: usize = 0x1000;

/// Page size the register base must be aligned to
pub const MMIO_PAGE_SIZE: u64 = 0x1000;

/// Offset of the enable register inside the window
pub const CONTROL_ENABLE_OFFSET: usize = 0x4;

/// Enable bit inside the enable register
pub const CONTROL_ENABLE_BIT: u32 = 1 << 0;

// =============================================================================
// Units
// =============================================================================

/// Bytes in one MiB
pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
