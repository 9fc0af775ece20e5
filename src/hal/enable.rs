//! Hardware enable latch
//!
//! Before the driver library can move data, one control bit in the DMA
//! register window has to be set. The bit is process-wide state: it is set
//! through a single init point ([`EnableLatch::enable`]) and stays set for the
//! life of the process unless the configuration asks for it to be cleared on
//! teardown.

use log::{debug, info};

use super::mmio::RegisterBlock;
use crate::constants::{CONTROL_ENABLE_BIT, CONTROL_ENABLE_OFFSET};
use crate::internal::cell::CriticalSectionCell;

/// Enable register layout and teardown policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableConfig {
    /// Byte offset of the enable register in the window
    pub offset: usize,
    /// Bit mask written to enable the engine
    pub bit: u32,
    /// Clear the bit again when the session closes
    pub clear_on_teardown: bool,
}

impl EnableConfig {
    /// Default register layout; the bit is left set on teardown
    pub const fn new() -> Self {
        Self {
            offset: CONTROL_ENABLE_OFFSET,
            bit: CONTROL_ENABLE_BIT,
            clear_on_teardown: false,
        }
    }

    /// Set whether teardown clears the enable bit
    #[must_use]
    pub const fn with_clear_on_teardown(mut self, clear: bool) -> Self {
        self.clear_on_teardown = clear;
        self
    }
}

impl Default for EnableConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Enable bit state as tracked by the latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnableState {
    /// Bit never written (or cleared on teardown)
    #[default]
    Disabled,
    /// Bit set
    Enabled,
}

/// Single init point for the enable bit
pub struct EnableLatch {
    state: CriticalSectionCell<EnableState>,
}

static PROCESS_LATCH: EnableLatch = EnableLatch::new();

impl EnableLatch {
    /// Create a latch in the disabled state (const, suitable for statics)
    pub const fn new() -> Self {
        Self {
            state: CriticalSectionCell::new(EnableState::Disabled),
        }
    }

    /// The latch shared by the whole process
    pub fn process() -> &'static EnableLatch {
        &PROCESS_LATCH
    }

    /// Current state
    pub fn state(&self) -> EnableState {
        self.state.with(|state| *state)
    }

    /// Set the enable bit unless this latch already did.
    ///
    /// Returns `true` if the register was written.
    pub fn enable<R: RegisterBlock>(&self, regs: &mut R, config: &EnableConfig) -> bool {
        self.state.with(|state| {
            if *state == EnableState::Enabled {
                debug!("DMA engine already enabled");
                return false;
            }
            regs.set_bits(config.offset, config.bit);
            *state = EnableState::Enabled;
            info!(
                "DMA engine enabled (offset {:#x}, bit {:#x})",
                config.offset, config.bit
            );
            true
        })
    }

    /// Teardown counterpart of [`enable`](Self::enable).
    ///
    /// Clears the bit only when `config.clear_on_teardown` is set and the bit
    /// was set through this latch. Returns `true` if the register was written.
    pub fn release<R: RegisterBlock>(&self, regs: &mut R, config: &EnableConfig) -> bool {
        if !config.clear_on_teardown {
            return false;
        }
        self.state.with(|state| {
            if *state != EnableState::Enabled {
                return false;
            }
            regs.clear_bits(config.offset, config.bit);
            *state = EnableState::Disabled;
            info!("DMA engine disabled");
            true
        })
    }
}

impl Default for EnableLatch {
    fn default() -> Self {
        Self::new()
    }
}
