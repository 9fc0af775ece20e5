//! In-process loopback engine
//!
//! Emulates a PL fabric that echoes every transmitted payload back on the
//! receive channel. Receives block until a payload arrives or the poll
//! timeout elapses, which the engine reports as
//! [`TransferError::TimedOut`].
//!
//! Faults can be queued on the receive side to exercise the receive loop's
//! error path without hardware.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, trace};

use super::{ChannelId, DmaDriver};
use crate::constants::RECEIVE_POLL_TIMEOUT_MS;
use crate::descriptor::{RxDescriptor, TxDescriptor};
use crate::error::{TransferError, TransferResult};

/// `EINVAL`, returned for transfers on channels the engine does not own
const EINVAL: i32 = 22;

/// One entry on the receive side of the fabric
type Completion = Result<Vec<u8>, i32>;

/// Loopback DMA engine
#[derive(Debug)]
pub struct LoopbackDriver {
    tx: Vec<ChannelId>,
    rx: Vec<ChannelId>,
    pending: Mutex<VecDeque<Completion>>,
    arrived: Condvar,
    poll_timeout: Duration,
    destroyed: bool,
}

impl LoopbackDriver {
    /// Engine with transmit channel 0 and receive channel 1
    pub fn new() -> Self {
        Self {
            tx: vec![ChannelId(0)],
            rx: vec![ChannelId(1)],
            pending: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
            poll_timeout: Duration::from_millis(RECEIVE_POLL_TIMEOUT_MS),
            destroyed: false,
        }
    }

    /// Replace the channel lists
    #[must_use]
    pub fn with_channels(mut self, tx: &[i32], rx: &[i32]) -> Self {
        self.tx = tx.iter().copied().map(ChannelId).collect();
        self.rx = rx.iter().copied().map(ChannelId).collect();
        self
    }

    /// Set how long a receive waits before timing out
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Queue a receive completion carrying a negative driver status
    pub fn inject_receive_fault(&self, status: i32) {
        self.push(Err(status));
    }

    /// Number of completions waiting to be received
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Whether [`DmaDriver::destroy`] has run
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Completion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, completion: Completion) {
        self.lock().push_back(completion);
        self.arrived.notify_one();
    }

    fn owns(channels: &[ChannelId], channel: ChannelId) -> TransferResult<()> {
        if channels.contains(&channel) {
            Ok(())
        } else {
            Err(TransferError::Rejected { status: -EINVAL })
        }
    }
}

impl Default for LoopbackDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaDriver for LoopbackDriver {
    fn tx_channels(&self) -> &[ChannelId] {
        &self.tx
    }

    fn rx_channels(&self) -> &[ChannelId] {
        &self.rx
    }

    fn send(&self, desc: &TxDescriptor, payload: &[u8]) -> TransferResult<usize> {
        Self::owns(&self.tx, desc.channel())?;
        let len = desc.input_size().min(payload.len());
        self.push(Ok(payload[..len].to_vec()));
        trace!("loopback: queued {len} bytes from channel {}", desc.channel());
        Ok(len)
    }

    fn receive(&self, desc: &RxDescriptor, buffer: &mut [u8]) -> TransferResult<usize> {
        Self::owns(&self.rx, desc.channel())?;

        let guard = self.lock();
        let (mut pending, _) = self
            .arrived
            .wait_timeout_while(guard, self.poll_timeout, |queue| queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        match pending.pop_front() {
            None => Err(TransferError::TimedOut),
            Some(Err(status)) => Err(TransferError::Rejected { status }),
            Some(Ok(data)) => {
                let len = data.len().min(buffer.len());
                buffer[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
        }
    }

    fn destroy(&mut self) {
        debug!("loopback: destroyed with {} pending completions", self.pending());
        self.lock().clear();
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelPair;
    use crate::descriptor::TransferDescriptor;
    use std::sync::Arc;
    use std::thread;

    fn descriptors(output_size: usize) -> (TxDescriptor, RxDescriptor) {
        let mut desc = TransferDescriptor::new();
        desc.resolve(ChannelPair {
            tx: ChannelId(0),
            rx: ChannelId(1),
        });
        desc.set_output_size(output_size);
        desc.split().unwrap()
    }

    fn fast() -> LoopbackDriver {
        LoopbackDriver::new().with_poll_timeout(Duration::from_millis(10))
    }

    #[test]
    fn default_channels() {
        let driver = LoopbackDriver::default();
        assert_eq!(driver.tx_channels(), &[ChannelId(0)]);
        assert_eq!(driver.rx_channels(), &[ChannelId(1)]);
    }

    #[test]
    fn send_is_echoed_to_receive() {
        let driver = fast();
        let (mut tx, rx) = descriptors(64);

        tx.set_input_size(4);
        assert_eq!(driver.send(&tx, &[1, 2, 3, 4, 5, 6]), Ok(4));
        assert_eq!(driver.pending(), 1);

        let mut buf = [0u8; 64];
        assert_eq!(driver.receive(&rx, &mut buf), Ok(4));
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn receive_truncates_to_buffer() {
        let driver = fast();
        let (mut tx, rx) = descriptors(2);
        tx.set_input_size(4);
        driver.send(&tx, &[9, 8, 7, 6]).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(driver.receive(&rx, &mut buf), Ok(2));
        assert_eq!(buf, [9, 8]);
    }

    #[test]
    fn empty_fabric_times_out() {
        let driver = fast();
        let (_, rx) = descriptors(8);
        let mut buf = [0u8; 8];
        assert_eq!(driver.receive(&rx, &mut buf), Err(TransferError::TimedOut));
    }

    #[test]
    fn injected_fault_is_reported() {
        let driver = fast();
        let (_, rx) = descriptors(8);
        driver.inject_receive_fault(-5);

        let mut buf = [0u8; 8];
        assert_eq!(
            driver.receive(&rx, &mut buf),
            Err(TransferError::Rejected { status: -5 })
        );
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let driver = fast().with_channels(&[2], &[3]);
        let (tx, _) = descriptors(8);
        assert_eq!(
            driver.send(&tx, &[0; 8]),
            Err(TransferError::Rejected { status: -EINVAL })
        );
    }

    #[test]
    fn receive_wakes_on_send_from_other_thread() {
        let driver = Arc::new(LoopbackDriver::new().with_poll_timeout(Duration::from_secs(5)));
        let (mut tx, rx) = descriptors(16);

        let receiver = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                let mut buf = [0u8; 16];
                driver.receive(&rx, &mut buf).map(|len| buf[..len].to_vec())
            })
        };

        thread::sleep(Duration::from_millis(20));
        tx.set_input_size(3);
        driver.send(&tx, &[4, 5, 6]).unwrap();

        assert_eq!(receiver.join().unwrap(), Ok(vec![4, 5, 6]));
    }

    #[test]
    fn destroy_drops_pending_completions() {
        let mut driver = fast();
        let (mut tx, _) = descriptors(8);
        tx.set_input_size(1);
        driver.send(&tx, &[1]).unwrap();

        driver.destroy();
        assert!(driver.is_destroyed());
        assert_eq!(driver.pending(), 0);
    }
}
