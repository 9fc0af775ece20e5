//! Channel resolution
//!
//! Picks the transmit/receive channel pair for a transfer: either an explicit
//! override checked against what the driver offers, or the lowest-numbered
//! channel of each direction.

use log::{debug, info};

use crate::descriptor::TransferDescriptor;
use crate::driver::{ChannelId, Direction, DmaDriver};
use crate::error::{ChannelError, ChannelResult, ConfigError, ConfigResult};

/// Borrowed, read-only view of the driver's channel list for one direction
#[derive(Debug, Clone, Copy)]
pub struct ChannelSet<'a> {
    direction: Direction,
    ids: &'a [ChannelId],
}

impl<'a> ChannelSet<'a> {
    /// View `direction`'s channels on `driver`
    pub fn of<D: DmaDriver + ?Sized>(driver: &'a D, direction: Direction) -> Self {
        Self {
            direction,
            ids: driver.channels(direction),
        }
    }

    /// Direction these channels carry
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the driver offers no channel in this direction
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` is offered
    pub fn contains(&self, id: ChannelId) -> bool {
        self.ids.contains(&id)
    }

    /// Numerically lowest channel id
    pub fn lowest(&self) -> Option<ChannelId> {
        self.ids.iter().copied().min()
    }

    /// Channel ids in driver order
    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + 'a {
        self.ids.iter().copied()
    }

    /// Fail with [`ChannelError::NoDeviceChannels`] if empty
    fn require_non_empty(self) -> ChannelResult<Self> {
        if self.is_empty() {
            return Err(ChannelError::NoDeviceChannels(self.direction));
        }
        Ok(self)
    }

    fn require(&self, id: ChannelId) -> ChannelResult<ChannelId> {
        if !self.contains(id) {
            return Err(ChannelError::UnknownChannel {
                direction: self.direction,
                channel: id,
            });
        }
        Ok(id)
    }
}

/// User channel choice, validated before it reaches the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSelection {
    /// Lowest-numbered channel in each direction
    #[default]
    Auto,
    /// Both channels given explicitly
    Explicit {
        /// Transmit channel
        tx: ChannelId,
        /// Receive channel
        rx: ChannelId,
    },
}

impl ChannelSelection {
    /// Build a selection from the two optional command-line overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnpairedChannel`] if exactly one override is given.
    pub fn from_overrides(tx: Option<i32>, rx: Option<i32>) -> ConfigResult<Self> {
        match (tx, rx) {
            (None, None) => Ok(ChannelSelection::Auto),
            (Some(tx), Some(rx)) => Ok(ChannelSelection::Explicit {
                tx: ChannelId(tx),
                rx: ChannelId(rx),
            }),
            _ => Err(ConfigError::UnpairedChannel),
        }
    }
}

/// Resolved transmit/receive channel pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelPair {
    /// Transmit channel
    pub tx: ChannelId,
    /// Receive channel
    pub rx: ChannelId,
}

/// Resolve `selection` against the channels `driver` offers.
///
/// The transmit set is checked before the receive set.
///
/// # Errors
///
/// - [`ChannelError::NoDeviceChannels`] if either set is empty
/// - [`ChannelError::UnknownChannel`] if an explicit id is not offered
pub fn resolve<D: DmaDriver + ?Sized>(
    driver: &D,
    selection: ChannelSelection,
) -> ChannelResult<ChannelPair> {
    let tx_set = ChannelSet::of(driver, Direction::Transmit).require_non_empty()?;
    let rx_set = ChannelSet::of(driver, Direction::Receive).require_non_empty()?;
    debug!(
        "driver offers {} transmit and {} receive channels",
        tx_set.len(),
        rx_set.len()
    );

    let pair = match selection {
        ChannelSelection::Auto => ChannelPair {
            tx: tx_set
                .lowest()
                .ok_or(ChannelError::NoDeviceChannels(Direction::Transmit))?,
            rx: rx_set
                .lowest()
                .ok_or(ChannelError::NoDeviceChannels(Direction::Receive))?,
        },
        ChannelSelection::Explicit { tx, rx } => ChannelPair {
            tx: tx_set.require(tx)?,
            rx: rx_set.require(rx)?,
        },
    };

    info!("resolved channels: tx={} rx={}", pair.tx, pair.rx);
    Ok(pair)
}

/// Resolve channels and record them in `descriptor`.
///
/// On error the descriptor is left unresolved.
pub fn resolve_into<D: DmaDriver + ?Sized>(
    driver: &D,
    selection: ChannelSelection,
    descriptor: &mut TransferDescriptor,
) -> ChannelResult<ChannelPair> {
    let pair = resolve(driver, selection)?;
    descriptor.resolve(pair);
    Ok(pair)
}
