//! Configuration types for a transfer session

use crate::channel::ChannelSelection;
use crate::constants::{DEFAULT_OUTPUT_SIZE, DEFAULT_SETTLE_INTERVAL_MS, MAX_TRANSFER_LEN};
use crate::error::{ConfigError, ConfigResult};
use crate::hal::enable::EnableConfig;
use crate::receive::ReceiveOptions;
use crate::transmit::TransmitSchedule;
use crate::units::mib_to_bytes;

/// Resolve the receive size from the two mutually exclusive size flags.
///
/// `bytes` is the `-s` form, `mib` the `-o` form. With neither, the receive
/// buffer capacity is used.
///
/// # Errors
///
/// - [`ConfigError::ConflictingSize`] if both are given
/// - [`ConfigError::InvalidMib`] if `mib` is negative or not finite
pub fn output_size_from_flags(bytes: Option<usize>, mib: Option<f64>) -> ConfigResult<usize> {
    match (bytes, mib) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingSize),
        (Some(bytes), None) => Ok(bytes),
        (None, Some(mib)) if !mib.is_finite() || mib < 0.0 => Err(ConfigError::InvalidMib(mib)),
        (None, Some(mib)) => Ok(mib_to_bytes(mib)),
        (None, None) => Ok(DEFAULT_OUTPUT_SIZE),
    }
}

/// Transfer session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Channel selection (auto or explicit pair)
    pub channels: ChannelSelection,
    /// Bytes requested per receive
    pub output_size: usize,
    /// Payload lengths sent by the transmit loop
    pub schedule: TransmitSchedule,
    /// Wait between consecutive sends in milliseconds
    pub settle_ms: u32,
    /// Receive loop termination and fault policy
    pub receive: ReceiveOptions,
    /// Hardware enable register and teardown policy
    pub enable: EnableConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: ChannelSelection::Auto,
            output_size: DEFAULT_OUTPUT_SIZE,
            schedule: TransmitSchedule::default(),
            settle_ms: DEFAULT_SETTLE_INTERVAL_MS,
            receive: ReceiveOptions::new(),
            enable: EnableConfig::new(),
        }
    }

    /// Set the channel selection
    #[must_use]
    pub fn with_channels(mut self, channels: ChannelSelection) -> Self {
        self.channels = channels;
        self
    }

    /// Set the receive size in bytes
    #[must_use]
    pub fn with_output_size(mut self, bytes: usize) -> Self {
        self.output_size = bytes;
        self
    }

    /// Set the transmit schedule
    #[must_use]
    pub fn with_schedule(mut self, schedule: TransmitSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the settling interval between sends
    #[must_use]
    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Stop receiving after `limit` completions
    #[must_use]
    pub fn with_receive_limit(mut self, limit: Option<usize>) -> Self {
        self.receive = self.receive.with_limit(limit);
        self
    }

    /// Replace the receive options
    #[must_use]
    pub fn with_receive_options(mut self, options: ReceiveOptions) -> Self {
        self.receive = options;
        self
    }

    /// Set the enable register configuration
    #[must_use]
    pub fn with_enable(mut self, enable: EnableConfig) -> Self {
        self.enable = enable;
        self
    }

    /// Check the configuration before any device activity.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidSize`] if the output size is zero or exceeds
    ///   the receive buffer
    /// - [`ConfigError::EmptySchedule`] if there is nothing to send
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output_size == 0 || self.output_size > MAX_TRANSFER_LEN {
            return Err(ConfigError::InvalidSize {
                requested: self.output_size,
                capacity: MAX_TRANSFER_LEN,
            });
        }
        if self.schedule.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        Ok(())
    }
}
