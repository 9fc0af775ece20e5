//! Testing utilities and mock implementations
//!
//! Mocks for exercising channel resolution, the device lifecycle and both
//! transfer loops on the host without a DMA engine.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::descriptor::{RxDescriptor, TxDescriptor};
use crate::driver::{ChannelId, DmaDriver};
use crate::error::{TransferError, TransferResult};
use crate::receive::{ReceiveEvent, ReceiveObserver};

// =============================================================================
// Call Log
// =============================================================================

/// One interaction with a mock, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Send { channel: ChannelId, len: usize },
    Receive { channel: ChannelId, capacity: usize },
    Delay { ms: u32 },
    Destroy,
}

/// Shared, ordered record of mock interactions
///
/// Cloning yields another handle to the same log, so a driver and a delay
/// can write into one sequence.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<DriverCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: DriverCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sizes of the sends, in order
    pub fn send_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Send { len, .. } => Some(len),
                _ => None,
            })
            .collect()
    }
}

/// Shared counter readable after the owning mock has been moved
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Mock Driver
// =============================================================================

/// Mock DMA driver with scripted results
///
/// Sends succeed with the full `input_size` unless results are queued with
/// [`with_send_results`](Self::with_send_results). Receives pop the queue
/// given to [`with_receives`](Self::with_receives); once it is exhausted a
/// receive idles briefly and reports [`TransferError::TimedOut`], like a
/// driver whose completion wait expired.
///
/// # Example
///
/// ```ignore
/// let driver = MockDriver::new(&[0], &[1]).with_receives([Ok(vec![1, 2, 3])]);
/// let log = driver.call_log();
/// // ... run a loop against the driver ...
/// assert_eq!(log.send_sizes(), vec![1000, 2000, 1800]);
/// ```
#[derive(Debug)]
pub struct MockDriver {
    tx: Vec<ChannelId>,
    rx: Vec<ChannelId>,
    log: CallLog,
    send_results: Mutex<VecDeque<TransferResult<usize>>>,
    receives: Mutex<VecDeque<TransferResult<Vec<u8>>>>,
    idle: Duration,
    destroys: Counter,
    in_flight: AtomicUsize,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockDriver {
    pub fn new(tx: &[i32], rx: &[i32]) -> Self {
        Self {
            tx: tx.iter().copied().map(ChannelId).collect(),
            rx: rx.iter().copied().map(ChannelId).collect(),
            log: CallLog::new(),
            send_results: Mutex::new(VecDeque::new()),
            receives: Mutex::new(VecDeque::new()),
            idle: Duration::from_millis(2),
            destroys: Counter::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue receive completions, returned in order
    #[must_use]
    pub fn with_receives<I>(self, receives: I) -> Self
    where
        I: IntoIterator<Item = TransferResult<Vec<u8>>>,
    {
        self.receives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(receives);
        self
    }

    /// Queue send results, returned in order before falling back to success
    #[must_use]
    pub fn with_send_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = TransferResult<usize>>,
    {
        self.send_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(results);
        self
    }

    /// Record into an existing log instead of a fresh one
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// How long an exhausted receive waits before timing out
    #[must_use]
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.log.calls()
    }

    pub fn destroy_counter(&self) -> Counter {
        self.destroys.clone()
    }

    /// Handle to the highest number of concurrent receives observed
    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }

    fn next_receive(&self) -> Option<TransferResult<Vec<u8>>> {
        self.receives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl DmaDriver for MockDriver {
    fn tx_channels(&self) -> &[ChannelId] {
        &self.tx
    }

    fn rx_channels(&self) -> &[ChannelId] {
        &self.rx
    }

    fn send(&self, desc: &TxDescriptor, payload: &[u8]) -> TransferResult<usize> {
        self.log.push(DriverCall::Send {
            channel: desc.channel(),
            len: desc.input_size(),
        });
        self.send_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(desc.input_size().min(payload.len())))
    }

    fn receive(&self, desc: &RxDescriptor, buffer: &mut [u8]) -> TransferResult<usize> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log.push(DriverCall::Receive {
            channel: desc.channel(),
            capacity: buffer.len(),
        });

        let result = match self.next_receive() {
            Some(Ok(data)) => {
                let len = data.len().min(buffer.len());
                buffer[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            Some(Err(err)) => Err(err),
            None => {
                thread::sleep(self.idle);
                Err(TransferError::TimedOut)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn destroy(&mut self) {
        self.log.push(DriverCall::Destroy);
        self.destroys.bump();
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing timing-dependent code
///
/// Tracks total delay time without actually sleeping. When built with
/// [`with_log`](Self::with_log), each millisecond delay is also recorded as
/// [`DriverCall::Delay`] so its position relative to driver calls can be
/// asserted.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
    log: Option<CallLog>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            total_ns: 0,
            log: Some(log),
        }
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
        if let Some(log) = &self.log {
            log.push(DriverCall::Delay { ms });
        }
    }
}

// =============================================================================
// Recording Observer
// =============================================================================

/// Owned copy of a [`ReceiveEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Data { channel: ChannelId, bytes: Vec<u8> },
    Fault { channel: ChannelId, error: TransferError },
}

/// Observer that keeps every event for later inspection
///
/// Clones share storage, so one handle can be moved into the receive task
/// while the test keeps another.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Observed>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lengths of the data completions, in arrival order
    pub fn data_lengths(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Observed::Data { bytes, .. } => Some(bytes.len()),
                Observed::Fault { .. } => None,
            })
            .collect()
    }
}

impl ReceiveObserver for RecordingObserver {
    fn observe(&mut self, event: ReceiveEvent<'_>) {
        let owned = match event {
            ReceiveEvent::Data { channel, bytes } => Observed::Data {
                channel,
                bytes: bytes.to_vec(),
            },
            ReceiveEvent::Fault { channel, error } => Observed::Fault { channel, error },
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(owned);
    }
}

// =============================================================================
// Self-tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;

    #[test]
    fn mock_delay_tracks_time() {
        let mut delay = MockDelay::new();
        delay.delay_ms(5);
        delay.delay_us(100);
        assert_eq!(delay.total_ms(), 5);
        assert_eq!(delay.total_ns(), 5_100_000);
    }

    #[test]
    fn mock_delay_shares_log() {
        let log = CallLog::new();
        let mut delay = MockDelay::with_log(log.clone());
        delay.delay_ms(3);
        assert_eq!(log.calls(), vec![DriverCall::Delay { ms: 3 }]);
    }

    #[test]
    fn exhausted_receives_time_out() {
        use crate::channel::ChannelPair;
        use crate::descriptor::TransferDescriptor;

        let driver = MockDriver::new(&[0], &[1]).with_receives([Ok(vec![1])]);
        let mut desc = TransferDescriptor::new();
        desc.resolve(ChannelPair {
            tx: ChannelId(0),
            rx: ChannelId(1),
        });
        let (_, rx) = desc.split().unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(driver.receive(&rx, &mut buf), Ok(1));
        assert_eq!(driver.receive(&rx, &mut buf), Err(TransferError::TimedOut));
        assert_eq!(driver.max_in_flight().load(Ordering::SeqCst), 1);
    }
}
