//! Device lifecycle
//!
//! [`Device`] brackets all DMA activity: it performs the one-time hardware
//! enable, acquires the driver handle, and releases the handle exactly once
//! when it is closed or dropped. A `Device` only exists after acquisition
//! succeeded, so teardown can never run before initialization.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --open()--> Initialized --close()/drop--> Destroyed
//! ```
//!
//! `Destroyed` is terminal; there is no re-initialization path.

use log::{debug, error, info};

use crate::descriptor::{RxDescriptor, TxDescriptor};
use crate::driver::{ChannelId, DmaDriver};
use crate::error::{DeviceResult, TransferResult};
use crate::hal::enable::{EnableConfig, EnableLatch};
use crate::hal::mmio::RegisterBlock;

/// Lifecycle state of a device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// No handle acquired yet
    #[default]
    Uninitialized,
    /// Handle acquired, transfers may run
    Initialized,
    /// Handle released
    Destroyed,
}

/// Exclusive owner of an initialized driver handle
///
/// Shared between the transmit and receive threads by `Arc`; every transfer
/// goes through `&self`.
#[derive(Debug)]
pub struct Device<D: DmaDriver> {
    driver: D,
    state: DeviceState,
}

impl<D: DmaDriver> Device<D> {
    /// Enable the DMA engine and acquire a driver handle.
    ///
    /// The enable bit is set through `latch` before `init` runs; `init` is the
    /// driver library's `initialize-device` entry point.
    ///
    /// # Errors
    ///
    /// Whatever `init` reports, typically
    /// [`DeviceError::InitFailed`](crate::error::DeviceError::InitFailed).
    /// No transfers are possible in that case.
    pub fn open<F, R>(
        init: F,
        regs: &mut R,
        latch: &EnableLatch,
        enable: &EnableConfig,
    ) -> DeviceResult<Self>
    where
        F: FnOnce() -> DeviceResult<D>,
        R: RegisterBlock,
    {
        latch.enable(regs, enable);

        let driver = init().inspect_err(|err| {
            error!("Failed to initialize the AXI DMA device: {err}");
        })?;
        info!("Succeed to initialize the AXI DMA device.");

        Ok(Self {
            driver,
            state: DeviceState::Initialized,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Borrow the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Transmit channel ids offered by the driver
    pub fn tx_channels(&self) -> &[ChannelId] {
        self.driver.tx_channels()
    }

    /// Receive channel ids offered by the driver
    pub fn rx_channels(&self) -> &[ChannelId] {
        self.driver.rx_channels()
    }

    /// Blocking send, see [`DmaDriver::send`]
    pub fn send(&self, desc: &TxDescriptor, payload: &[u8]) -> TransferResult<usize> {
        self.driver.send(desc, payload)
    }

    /// Blocking receive, see [`DmaDriver::receive`]
    pub fn receive(&self, desc: &RxDescriptor, buffer: &mut [u8]) -> TransferResult<usize> {
        self.driver.receive(desc, buffer)
    }

    /// Release the driver handle now.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.state != DeviceState::Initialized {
            return;
        }
        debug!("destroying AXI DMA device");
        self.driver.destroy();
        self.state = DeviceState::Destroyed;
    }
}

impl<D: DmaDriver> Drop for Device<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::hal::mmio::MemoryRegion;
    use crate::test_utils::{DriverCall, MockDriver};

    fn open(driver: MockDriver, latch: &EnableLatch) -> DeviceResult<Device<MockDriver>> {
        let mut regs = MemoryRegion::new(0x10);
        Device::open(|| Ok(driver), &mut regs, latch, &EnableConfig::new())
    }

    #[test]
    fn device_state_default() {
        assert_eq!(DeviceState::default(), DeviceState::Uninitialized);
    }

    #[test]
    fn open_enables_then_initializes() {
        let latch = EnableLatch::new();
        let mut regs = MemoryRegion::new(0x10);
        let driver = MockDriver::new(&[0], &[1]);

        let device = Device::open(|| Ok(driver), &mut regs, &latch, &EnableConfig::new()).unwrap();
        assert_eq!(device.state(), DeviceState::Initialized);
        assert_eq!(regs.read32(0x4), 1);
        assert_eq!(device.tx_channels(), &[ChannelId(0)]);
        assert_eq!(device.rx_channels(), &[ChannelId(1)]);
    }

    #[test]
    fn failed_init_never_destroys() {
        let latch = EnableLatch::new();
        let mut regs = MemoryRegion::new(0x10);

        let result: DeviceResult<Device<MockDriver>> = Device::open(
            || Err(DeviceError::InitFailed),
            &mut regs,
            &latch,
            &EnableConfig::new(),
        );
        assert_eq!(result.unwrap_err(), DeviceError::InitFailed);
    }

    #[test]
    fn close_destroys_exactly_once() {
        let latch = EnableLatch::new();
        let driver = MockDriver::new(&[0], &[1]);
        let destroys = driver.destroy_counter();

        let device = open(driver, &latch).unwrap();
        device.close();
        assert_eq!(destroys.get(), 1);
    }

    #[test]
    fn drop_destroys_exactly_once() {
        let latch = EnableLatch::new();
        let driver = MockDriver::new(&[0], &[1]);
        let destroys = driver.destroy_counter();
        let log = driver.call_log();

        {
            let _device = open(driver, &latch).unwrap();
        }
        assert_eq!(destroys.get(), 1);
        assert_eq!(log.calls(), vec![DriverCall::Destroy]);
    }

    #[test]
    fn second_open_does_not_rewrite_enable_bit() {
        let latch = EnableLatch::new();
        let mut regs = MemoryRegion::new(0x10);

        let first = Device::open(
            || Ok(MockDriver::new(&[0], &[1])),
            &mut regs,
            &latch,
            &EnableConfig::new(),
        )
        .unwrap();
        first.close();
        let _second = Device::open(
            || Ok(MockDriver::new(&[0], &[1])),
            &mut regs,
            &latch,
            &EnableConfig::new(),
        )
        .unwrap();
        assert_eq!(regs.write_count(), 1);
    }

    #[test]
    fn transfers_forward_to_driver() {
        use crate::channel::ChannelPair;
        use crate::descriptor::TransferDescriptor;

        let latch = EnableLatch::new();
        let driver = MockDriver::new(&[0], &[1]).with_receives([Ok(vec![7, 8, 9])]);
        let device = open(driver, &latch).unwrap();

        let mut desc = TransferDescriptor::new();
        desc.resolve(ChannelPair {
            tx: ChannelId(0),
            rx: ChannelId(1),
        });
        desc.set_output_size(16);
        let (mut tx, rx) = desc.split().unwrap();

        tx.set_input_size(3);
        assert_eq!(device.send(&tx, &[1, 2, 3]), Ok(3));

        let mut buf = [0u8; 16];
        assert_eq!(device.receive(&rx, &mut buf), Ok(3));
        assert_eq!(&buf[..3], &[7, 8, 9]);
    }
}
