//! Error types for the AXI DMA transfer core
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Contradictory or malformed transfer configuration
//! - [`DeviceError`]: Device acquisition and register mapping failures
//! - [`ChannelError`]: Channel discovery and selection failures
//! - [`TransferError`]: Runtime send/receive failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by the session-level operations.

use thiserror::Error;

use crate::driver::{ChannelId, Direction};

/// `ENODEV`, reported when the device exposes no usable channels
const ENODEV: i32 = 19;

/// Largest status the process can report; `exit` keeps only the low 8 bits
const MAX_EXIT_STATUS: u32 = 255;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration errors
///
/// Raised before any device activity is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// Only one of the transmit/receive channel overrides was given
    #[error("either both -t and -r must be specified, or neither")]
    UnpairedChannel,
    /// Both the byte and the MiB form of the output size were given
    #[error("only one of -s and -o can be specified")]
    ConflictingSize,
    /// A transfer size is zero or larger than the buffer capacity
    #[error("invalid transfer size {requested} (buffer capacity is {capacity} bytes)")]
    InvalidSize {
        /// Requested size in bytes
        requested: usize,
        /// Capacity of the buffer the size applies to
        capacity: usize,
    },
    /// A MiB value that is negative or not finite
    #[error("invalid MiB size {0}")]
    InvalidMib(f64),
    /// The transmit schedule has no steps
    #[error("transmit schedule is empty")]
    EmptySchedule,
}

// =============================================================================
// Device Errors
// =============================================================================

/// Device lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The driver library could not hand out a device handle
    #[error("failed to initialize the AXI DMA device")]
    InitFailed,
    /// The control register window could not be mapped
    #[error("failed to map control registers at 0x{base:08x}: {source}")]
    RegisterMap {
        /// Physical base address of the window
        base: u64,
        /// Underlying OS error
        source: rustix::io::Errno,
    },
    /// The register window base is not page aligned
    #[error("register base 0x{0:08x} is not page aligned")]
    MisalignedRegisters(u64),
    /// The receive loop has already been handed the receive descriptor
    #[error("receive loop already started")]
    ReceiverActive,
}

// =============================================================================
// Channel Errors
// =============================================================================

/// Channel discovery and selection errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The driver reported an empty channel set for a direction
    #[error("no {0} channels were found")]
    NoDeviceChannels(Direction),
    /// An explicit channel override is not offered by the driver
    #[error("{direction} channel {channel} is not provided by the device")]
    UnknownChannel {
        /// Direction of the rejected override
        direction: Direction,
        /// The rejected channel id
        channel: ChannelId,
    },
    /// The descriptor was used before channel resolution
    #[error("transfer descriptor has no resolved channels")]
    Unresolved,
}

// =============================================================================
// Transfer Errors
// =============================================================================

/// Runtime send/receive errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The driver returned a negative status
    #[error("driver rejected transfer (status {status})")]
    Rejected {
        /// Raw status returned by the driver
        status: i32,
    },
    /// The requested length does not fit the transfer buffer
    #[error("transfer of {requested} bytes exceeds buffer capacity of {capacity} bytes")]
    ExceedsCapacity {
        /// Requested length in bytes
        requested: usize,
        /// Buffer capacity in bytes
        capacity: usize,
    },
    /// The driver's own completion timeout elapsed
    #[error("transfer timed out")]
    TimedOut,
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Channel(ChannelError::NoDeviceChannels(_))) => { /* ... */ }
///     Err(Error::Transfer(TransferError::Rejected { status })) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Error {
    /// Configuration error
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// Device error
    #[error("device: {0}")]
    Device(#[from] DeviceError),
    /// Channel error
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),
    /// Transfer error
    #[error("transfer: {0}")]
    Transfer(#[from] TransferError),
    /// The receive thread could not be started
    #[error("failed to spawn receive thread ({0})")]
    Spawn(std::io::ErrorKind),
    /// The receive thread panicked
    #[error("receive thread panicked")]
    TaskPanicked,
    /// The receive thread was still inside a driver receive when the join
    /// deadline passed; it was detached
    #[error("receive thread did not stop within {0} ms")]
    ReceiveStalled(u64),
    /// A termination signal handler could not be installed
    #[error("failed to install signal handler ({0})")]
    Signal(std::io::ErrorKind),
}

impl Error {
    /// Process exit status for this error.
    ///
    /// A rejected transfer reports the driver status sign-corrected to
    /// positive; missing channels report `ENODEV`; everything else is 1.
    /// Statuses that do not fit an exit status (above 255) also report 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Transfer(TransferError::Rejected { status })
                if (1..=MAX_EXIT_STATUS).contains(&status.unsigned_abs()) =>
            {
                status.unsigned_abs() as i32
            }
            Error::Channel(ChannelError::NoDeviceChannels(_)) => ENODEV,
            _ => 1,
        }
    }
}

/// Result type alias for session-level operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for device lifecycle operations
pub type DeviceResult<T> = core::result::Result<T, DeviceError>;

/// Result type alias for channel resolution
pub type ChannelResult<T> = core::result::Result<T, ChannelError>;

/// Result type alias for send/receive operations
pub type TransferResult<T> = core::result::Result<T, TransferError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::UnpairedChannel;
        assert_eq!(
            err.to_string(),
            "either both -t and -r must be specified, or neither"
        );
        assert_eq!(
            ConfigError::ConflictingSize.to_string(),
            "only one of -s and -o can be specified"
        );
    }

    #[test]
    fn channel_error_names_direction() {
        let err = ChannelError::NoDeviceChannels(Direction::Receive);
        assert_eq!(err.to_string(), "no receive channels were found");

        let err = ChannelError::UnknownChannel {
            direction: Direction::Transmit,
            channel: ChannelId(7),
        };
        assert!(err.to_string().contains("transmit channel 7"));
    }

    #[test]
    fn transfer_error_display() {
        let err = TransferError::ExceedsCapacity {
            requested: 4096,
            capacity: 2048,
        };
        let display = err.to_string();
        assert!(display.contains("4096"));
        assert!(display.contains("2048"));
    }

    #[test]
    fn error_from_domain_errors() {
        let err: Error = ConfigError::EmptySchedule.into();
        assert_eq!(err, Error::Config(ConfigError::EmptySchedule));

        let err: Error = DeviceError::InitFailed.into();
        assert_eq!(err, Error::Device(DeviceError::InitFailed));

        let err: Error = TransferError::TimedOut.into();
        assert!(matches!(err, Error::Transfer(TransferError::TimedOut)));
    }

    #[test]
    fn error_display_prefixes_domain() {
        let err = Error::Device(DeviceError::InitFailed);
        assert!(err.to_string().starts_with("device:"));

        let err = Error::Transfer(TransferError::Rejected { status: -5 });
        assert!(err.to_string().starts_with("transfer:"));
        assert!(err.to_string().contains("-5"));
    }

    #[test]
    fn exit_code_sign_corrects_rejected_status() {
        let err = Error::Transfer(TransferError::Rejected { status: -110 });
        assert_eq!(err.exit_code(), 110);
    }

    #[test]
    fn exit_code_for_missing_channels_is_enodev() {
        let err = Error::Channel(ChannelError::NoDeviceChannels(Direction::Transmit));
        assert_eq!(err.exit_code(), 19);
    }

    #[test]
    fn exit_code_never_wraps_to_success() {
        let code = |status| Error::Transfer(TransferError::Rejected { status }).exit_code();
        assert_eq!(code(-255), 255);
        assert_eq!(code(-256), 1);
        assert_eq!(code(-300), 1);
        assert_eq!(code(i32::MIN), 1);
        assert_eq!(code(512), 1);
    }

    #[test]
    fn exit_code_defaults_to_one() {
        assert_eq!(Error::Device(DeviceError::InitFailed).exit_code(), 1);
        assert_eq!(Error::Config(ConfigError::UnpairedChannel).exit_code(), 1);
        assert_eq!(Error::TaskPanicked.exit_code(), 1);
        assert_eq!(
            Error::Transfer(TransferError::Rejected { status: 0 }).exit_code(),
            1
        );
    }
}
