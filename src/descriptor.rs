//! Transfer descriptors
//!
//! A [`TransferDescriptor`] starts zero-initialised and is populated once by
//! the channel resolver. Before any transfer runs it is split into one
//! descriptor per direction: the transmit loop owns a [`TxDescriptor`] and
//! the receive loop owns an [`RxDescriptor`], so each side can only ever
//! update its own size field.

use crate::channel::ChannelPair;
use crate::driver::ChannelId;
use crate::error::{ChannelError, ChannelResult};

/// Channel selection and per-call sizes for both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferDescriptor {
    /// Both channel ids, resolved together
    channels: Option<ChannelPair>,
    /// Bytes sent per transmit call
    input_size: usize,
    /// Receive capacity per receive call
    output_size: usize,
}

impl TransferDescriptor {
    /// Zero-initialised descriptor with unresolved channels
    pub const fn new() -> Self {
        Self {
            channels: None,
            input_size: 0,
            output_size: 0,
        }
    }

    /// Record the resolved channel pair
    pub fn resolve(&mut self, pair: ChannelPair) {
        self.channels = Some(pair);
    }

    /// Resolved channel pair, if any
    pub fn channels(&self) -> Option<ChannelPair> {
        self.channels
    }

    /// Whether channel resolution has run
    pub fn is_resolved(&self) -> bool {
        self.channels.is_some()
    }

    /// Bytes sent per transmit call
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Set the bytes sent per transmit call
    pub fn set_input_size(&mut self, len: usize) {
        self.input_size = len;
    }

    /// Receive capacity per receive call
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Set the receive capacity per receive call
    pub fn set_output_size(&mut self, len: usize) {
        self.output_size = len;
    }

    /// Hand out the per-direction descriptors.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Unresolved`] if the resolver has not run.
    pub fn split(self) -> ChannelResult<(TxDescriptor, RxDescriptor)> {
        let pair = self.channels.ok_or(ChannelError::Unresolved)?;
        Ok((
            TxDescriptor {
                channel: pair.tx,
                input_size: self.input_size,
            },
            RxDescriptor {
                channel: pair.rx,
                output_size: self.output_size,
            },
        ))
    }
}

/// Transmit half of a resolved descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDescriptor {
    channel: ChannelId,
    input_size: usize,
}

impl TxDescriptor {
    /// Transmit channel
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Bytes sent by the next transmit call
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Update the payload length for the next transmit call
    pub fn set_input_size(&mut self, len: usize) {
        self.input_size = len;
    }
}

/// Receive half of a resolved descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxDescriptor {
    channel: ChannelId,
    output_size: usize,
}

impl RxDescriptor {
    /// Receive channel
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Receive capacity for each receive call
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Update the receive capacity
    pub fn set_output_size(&mut self, len: usize) {
        self.output_size = len;
    }
}
