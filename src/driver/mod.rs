//! DMA driver library interface
//!
//! The transfer core consumes the driver library only through [`DmaDriver`].
//! Two engines implement it:
//!
//! - [`loopback::LoopbackDriver`]: in-process engine that feeds every sent
//!   payload back to the receive side
//! - [`ffi::LibAxiDma`]: bindings to the C `libaxidma` library
//!   (`libaxidma` feature)
//!
//! Device acquisition (`initialize-device`) is the engine's constructor;
//! the [`Device`](crate::device::Device) wrapper owns the handle afterwards
//! and guarantees [`DmaDriver::destroy`] runs exactly once.

use core::fmt;

use crate::descriptor::{RxDescriptor, TxDescriptor};
use crate::error::TransferResult;

#[cfg(feature = "libaxidma")]
pub mod ffi;
pub mod loopback;

/// Driver-assigned channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChannelId(pub i32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ChannelId {
    fn from(id: i32) -> Self {
        ChannelId(id)
    }
}

/// Transfer direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Memory to fabric
    Transmit,
    /// Fabric to memory
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Transmit => "transmit",
            Direction::Receive => "receive",
        })
    }
}

/// Opaque transfer primitive provided by the DMA driver library.
///
/// `send` and `receive` block the calling thread until the hardware
/// operation completes or fails. Both take `&self`: the transmit and receive
/// channels are independent hardware lanes, so one thread may send while
/// another receives on the same handle.
pub trait DmaDriver: Send + Sync {
    /// Transmit channel ids, in driver order
    fn tx_channels(&self) -> &[ChannelId];

    /// Receive channel ids, in driver order
    fn rx_channels(&self) -> &[ChannelId];

    /// Channel ids for `direction`
    fn channels(&self, direction: Direction) -> &[ChannelId] {
        match direction {
            Direction::Transmit => self.tx_channels(),
            Direction::Receive => self.rx_channels(),
        }
    }

    /// Send the first `desc.input_size()` bytes of `payload` on the
    /// descriptor's transmit channel.
    ///
    /// Returns the number of bytes accepted. A negative driver status maps to
    /// [`TransferError::Rejected`](crate::error::TransferError::Rejected).
    fn send(&self, desc: &TxDescriptor, payload: &[u8]) -> TransferResult<usize>;

    /// Receive into `buffer` on the descriptor's receive channel.
    ///
    /// Returns the number of bytes actually received, which may be less than
    /// `buffer.len()`. An engine with its own completion timeout reports it as
    /// [`TransferError::TimedOut`](crate::error::TransferError::TimedOut).
    fn receive(&self, desc: &RxDescriptor, buffer: &mut [u8]) -> TransferResult<usize>;

    /// Release the device handle. Called once by the owning `Device`.
    fn destroy(&mut self);
}
