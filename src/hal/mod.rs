//! Hardware Abstraction Layer
//!
//! Host-side access to the DMA control registers and timing.
//!
//! # Modules
//!
//! - [`mmio`]: Register blocks (mapped `/dev/mem` window or plain memory)
//! - [`enable`]: Process-wide hardware enable latch
//! - [`delay`]: Blocking delay for the transmit settling interval
//!
//! # Delay Integration
//!
//! Types that pace hardware use `embedded_hal::delay::DelayNs` directly, so
//! tests can substitute a recording delay.

pub mod delay;
pub mod enable;
pub mod mmio;

// Re-export commonly used types
pub use delay::StdDelay;
pub use enable::{EnableConfig, EnableLatch, EnableState};
pub use mmio::{MappedRegion, MemoryRegion, RegisterBlock};
