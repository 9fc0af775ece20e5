//! Transfer session
//!
//! A [`Session`] wires the pieces together for one run: validate the
//! configuration, enable and open the device, resolve channels into the
//! transfer descriptor, then drive the transmit loop on the calling thread
//! and the receive loop on its own thread.
//!
//! Receiving starts only once the whole schedule was sent, so a failed send
//! never leaves a receive thread behind.
//!
//! ```ignore
//! let mut session = Session::open(config, LoopbackDriver::new, &mut regs, EnableLatch::process())?;
//! let (report, rx) = session.run(&mut StdDelay::new(), HexDumpObserver::stdout())?;
//! let summary = session.shutdown(rx, Duration::from_secs(1), &mut regs, EnableLatch::process())?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::buffer::TxBuffer;
use crate::channel::{self, ChannelPair};
use crate::config::TransferConfig;
use crate::descriptor::{RxDescriptor, TransferDescriptor, TxDescriptor};
use crate::device::Device;
use crate::driver::DmaDriver;
use crate::error::{DeviceError, DeviceResult, Result};
use crate::hal::enable::EnableLatch;
use crate::hal::mmio::RegisterBlock;
use crate::receive::{ReceiveObserver, ReceiveSummary, ReceiveTask, StopToken};
use crate::transmit::{TransmitLoop, TransmitReport};
use crate::units::bytes_to_mib;

/// One run of the transfer tool against an opened device
pub struct Session<D: DmaDriver> {
    device: Arc<Device<D>>,
    channels: ChannelPair,
    tx: TxDescriptor,
    rx: Option<RxDescriptor>,
    tx_buffer: TxBuffer,
    config: TransferConfig,
    stop: StopToken,
}

impl<D: DmaDriver + 'static> Session<D> {
    /// Validate `config`, open the device and resolve channels.
    ///
    /// Configuration errors are reported before the enable bit is touched.
    /// If channel resolution fails the device is destroyed before returning.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::error::Error::Config) for an invalid configuration
    /// - [`Error::Device`](crate::error::Error::Device) if `init` fails
    /// - [`Error::Channel`](crate::error::Error::Channel) if channels cannot be resolved
    pub fn open<F, R>(
        config: TransferConfig,
        init: F,
        regs: &mut R,
        latch: &EnableLatch,
    ) -> Result<Self>
    where
        F: FnOnce() -> DeviceResult<D>,
        R: RegisterBlock,
    {
        config.validate()?;

        let device = Device::open(init, regs, latch, &config.enable)?;

        let mut desc = TransferDescriptor::new();
        let channels = channel::resolve_into(device.driver(), config.channels, &mut desc)?;
        desc.set_output_size(config.output_size);
        if let Some(&first) = config.schedule.sizes().first() {
            desc.set_input_size(first);
        }

        info!("AXI DMA File Transfer Info:");
        info!("\tTransmit Channel: {}", channels.tx);
        info!("\tReceive Channel: {}", channels.rx);
        info!(
            "\tInput Data Size: {:.4} MiB",
            bytes_to_mib(desc.input_size())
        );
        info!(
            "\tOutput Data Size: {:.4} MiB",
            bytes_to_mib(desc.output_size())
        );

        let (tx, rx) = desc.split()?;

        Ok(Self {
            device: Arc::new(device),
            channels,
            tx,
            rx: Some(rx),
            tx_buffer: TxBuffer::with_pattern(),
            config,
            stop: StopToken::new(),
        })
    }

    /// Use `stop` for the receive task, e.g. one tied to a signal handler
    #[must_use]
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// Token that stops the receive task
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Resolved channel pair
    pub fn channels(&self) -> ChannelPair {
        self.channels
    }

    /// The opened device
    pub fn device(&self) -> &Device<D> {
        &self.device
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Run the transmit schedule on the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::Transfer`](crate::error::Error::Transfer) from the first
    /// failing send.
    pub fn transmit<DL: DelayNs>(&mut self, delay: &mut DL) -> Result<TransmitReport> {
        let mut tx = TransmitLoop::new(&self.device, self.tx, &self.tx_buffer)
            .with_settle_ms(self.config.settle_ms);
        let result = tx.run(&self.config.schedule, delay);
        self.tx = *tx.descriptor();

        let report = result?;
        info!("transmit done: {} sends, {} bytes", report.sends, report.bytes);
        Ok(report)
    }

    /// Start the receive loop on its own thread.
    ///
    /// The receive descriptor moves into the task, so only one receive loop
    /// can exist per session.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::ReceiverActive`] on a second call
    /// - [`Error::Spawn`](crate::error::Error::Spawn) if the thread cannot start
    pub fn start_receive<O>(&mut self, observer: O) -> Result<ReceiveTask>
    where
        O: ReceiveObserver + 'static,
    {
        let rx = self.rx.take().ok_or(DeviceError::ReceiverActive)?;
        ReceiveTask::spawn(
            Arc::clone(&self.device),
            rx,
            observer,
            self.config.receive,
            self.stop.clone(),
        )
    }

    /// Transmit the schedule, then start receiving.
    ///
    /// # Errors
    ///
    /// As [`transmit`](Self::transmit), in which case no receive thread is
    /// started, or as [`start_receive`](Self::start_receive).
    pub fn run<DL, O>(
        &mut self,
        delay: &mut DL,
        observer: O,
    ) -> Result<(TransmitReport, ReceiveTask)>
    where
        DL: DelayNs,
        O: ReceiveObserver + 'static,
    {
        let report = self.transmit(delay)?;
        let task = self.start_receive(observer)?;
        Ok((report, task))
    }

    /// Stop the receive task, wait at most `grace` for it, then close.
    ///
    /// The session is closed whatever the task does. A task stuck in the
    /// driver is detached and keeps the device alive until its receive
    /// returns.
    ///
    /// # Errors
    ///
    /// As [`ReceiveTask::join_timeout`].
    pub fn shutdown<R: RegisterBlock>(
        self,
        task: ReceiveTask,
        grace: Duration,
        regs: &mut R,
        latch: &EnableLatch,
    ) -> Result<ReceiveSummary> {
        task.stop();
        let received = task.join_timeout(grace);
        self.close(regs, latch);
        received
    }

    /// Destroy the device and apply the enable teardown policy.
    ///
    /// Join the receive task first; if it still holds the device, destruction
    /// is deferred to the task's exit.
    pub fn close<R: RegisterBlock>(self, regs: &mut R, latch: &EnableLatch) {
        match Arc::try_unwrap(self.device) {
            Ok(device) => device.close(),
            Err(_) => warn!("receive task still running, device teardown deferred"),
        }
        latch.release(regs, &self.config.enable);
        info!("session closed");
    }
}
