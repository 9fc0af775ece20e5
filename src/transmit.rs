//! Transmit loop
//!
//! Sends a fixed schedule of payloads from the transmit buffer, one after
//! another, waiting a settling interval between consecutive sends so the
//! fabric can echo each payload before the next one goes out.

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::buffer::TxBuffer;
use crate::constants::{DEFAULT_SETTLE_INTERVAL_MS, DEFAULT_TRANSMIT_SIZES, MAX_TRANSFER_LEN};
use crate::descriptor::TxDescriptor;
use crate::device::Device;
use crate::driver::DmaDriver;
use crate::error::{ConfigError, ConfigResult, TransferResult};

/// Ordered list of payload lengths to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitSchedule {
    sizes: Vec<usize>,
}

impl TransmitSchedule {
    /// Build a schedule.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptySchedule`] if `sizes` is empty
    /// - [`ConfigError::InvalidSize`] if a size is zero or exceeds the
    ///   transmit buffer
    pub fn new(sizes: Vec<usize>) -> ConfigResult<Self> {
        if sizes.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if let Some(&bad) = sizes
            .iter()
            .find(|&&len| len == 0 || len > MAX_TRANSFER_LEN)
        {
            return Err(ConfigError::InvalidSize {
                requested: bad,
                capacity: MAX_TRANSFER_LEN,
            });
        }
        Ok(Self { sizes })
    }

    /// Payload lengths in send order
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of sends
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always `false` for a validated schedule
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total bytes the schedule sends
    pub fn total_bytes(&self) -> usize {
        self.sizes.iter().sum()
    }
}

impl Default for TransmitSchedule {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_TRANSMIT_SIZES.to_vec(),
        }
    }
}

/// Outcome of a completed transmit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitReport {
    /// Number of sends that completed
    pub sends: usize,
    /// Bytes reported sent by the driver
    pub bytes: usize,
}

/// One pass over a [`TransmitSchedule`]
pub struct TransmitLoop<'a, D: DmaDriver> {
    device: &'a Device<D>,
    desc: TxDescriptor,
    buffer: &'a TxBuffer,
    settle_ms: u32,
}

impl<'a, D: DmaDriver> TransmitLoop<'a, D> {
    /// Prepare a loop with the default settling interval
    pub fn new(device: &'a Device<D>, desc: TxDescriptor, buffer: &'a TxBuffer) -> Self {
        Self {
            device,
            desc,
            buffer,
            settle_ms: DEFAULT_SETTLE_INTERVAL_MS,
        }
    }

    /// Set the wait between consecutive sends
    #[must_use]
    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Descriptor as left by the last send
    pub fn descriptor(&self) -> &TxDescriptor {
        &self.desc
    }

    /// Send every step of `schedule` in order.
    ///
    /// The first failing send aborts the sequence; later steps are not
    /// attempted.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ExceedsCapacity`](crate::error::TransferError::ExceedsCapacity)
    ///   if a step does not fit the buffer (checked before the driver call)
    /// - whatever the driver's `send` reports, normally
    ///   [`TransferError::Rejected`](crate::error::TransferError::Rejected)
    pub fn run<DL: DelayNs>(
        &mut self,
        schedule: &TransmitSchedule,
        delay: &mut DL,
    ) -> TransferResult<TransmitReport> {
        let mut report = TransmitReport::default();

        for (step, &len) in schedule.sizes().iter().enumerate() {
            if step > 0 && self.settle_ms > 0 {
                delay.delay_ms(self.settle_ms);
            }

            let payload = self.buffer.payload(len)?;
            self.desc.set_input_size(len);
            let sent = self
                .device
                .send(&self.desc, payload)
                .inspect_err(|err| error!("send {} of {len} bytes failed: {err}", step + 1))?;

            report.sends += 1;
            report.bytes += sent;
            info!(
                "sent {sent} bytes on channel {} ({}/{})",
                self.desc.channel(),
                step + 1,
                schedule.len()
            );
        }

        Ok(report)
    }
}
