//! AXI DMA Duplex Transfer
//!
//! Orchestrates full-duplex transfers over a Xilinx AXI DMA engine driven by
//! the `libaxidma` userspace library: one thread sends a fixed schedule of
//! payloads to the programmable logic while a second thread receives
//! whatever the fabric sends back.
//!
//! # Architecture
//!
//! The crate is organized into three layers:
//!
//! 1. **Session Layer** ([`session`]): Configuration, channel resolution,
//!    and the transmit/receive loops ([`transmit`], [`receive`])
//! 2. **Device Layer** ([`device`], [`driver`]): Device lifecycle and the
//!    [`DmaDriver`] seam over the driver library
//! 3. **HAL Layer** ([`hal`]): Control register mapping, the hardware
//!    enable latch, and delays
//!
//! # Lifecycle
//!
//! ```text
//! enable bit -> initialize device -> resolve channels -> transfers -> destroy
//! ```
//!
//! The enable bit is set once per process. The device handle is released
//! exactly once, on [`Session::close`] or when the last owner drops it.
//!
//! # Features
//!
//! - `libaxidma`: Link against the C driver library for real hardware.
//!   Without it only [`LoopbackDriver`] is available.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use axidma_duplex::{
//!     EnableLatch, HexDumpObserver, LoopbackDriver, MemoryRegion, Session, StdDelay,
//!     TransferConfig,
//! };
//!
//! # fn main() -> axidma_duplex::Result<()> {
//! let config = TransferConfig::new()
//!     .with_settle_ms(100)
//!     .with_receive_limit(Some(3));
//! let mut regs = MemoryRegion::new(0x10);
//! let latch = EnableLatch::process();
//!
//! let mut session = Session::open(config, || Ok(LoopbackDriver::new()), &mut regs, latch)?;
//! let (_report, rx) = session.run(&mut StdDelay::new(), HexDumpObserver::stdout())?;
//! session.shutdown(rx, Duration::from_secs(1), &mut regs, latch)?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live in Cargo.toml.

// =============================================================================
// Modules
// =============================================================================

pub mod buffer;
pub mod channel;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod device;
pub mod driver;
pub mod error;
pub mod hal;
pub mod logging;
pub mod receive;
pub mod session;
pub mod transmit;
pub mod units;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(test)]
mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use buffer::{RxBuffer, TransferBuffer, TxBuffer};
pub use channel::{ChannelPair, ChannelSelection, ChannelSet};
pub use config::{TransferConfig, output_size_from_flags};
pub use descriptor::{RxDescriptor, TransferDescriptor, TxDescriptor};
pub use device::{Device, DeviceState};
pub use driver::loopback::LoopbackDriver;
pub use driver::{ChannelId, Direction, DmaDriver};
pub use error::{ChannelError, ConfigError, DeviceError, Error, Result, TransferError};
pub use hal::{EnableConfig, EnableLatch, EnableState, MappedRegion, MemoryRegion, RegisterBlock, StdDelay};
pub use receive::{
    HexDumpObserver, ReceiveEvent, ReceiveObserver, ReceiveOptions, ReceiveSummary, ReceiveTask,
    StopToken,
};
pub use session::Session;
pub use transmit::{TransmitLoop, TransmitReport, TransmitSchedule};

#[cfg(feature = "libaxidma")]
pub use driver::ffi::LibAxiDma;
