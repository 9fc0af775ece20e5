//! Receive loop
//!
//! Continuously receives from the resolved receive channel on a dedicated
//! thread and hands every completion to a [`ReceiveObserver`].
//!
//! # Ownership
//!
//! The thread is owned by a [`ReceiveTask`]: it is stopped through a
//! [`StopToken`] and joined. Dropping the task stops and joins it as well.
//! Only [`ReceiveTask::join_timeout`] detaches, when the thread is stuck in a
//! driver receive past the deadline.
//!
//! # Ordering
//!
//! Receives are strictly sequential. The next receive is only issued once
//! the previous one returned, so at most one is in flight and observations
//! arrive in completion order.
//!
//! # Faults
//!
//! A driver timeout is not an observation; the loop re-checks the stop token
//! and receives again. Any other error is reported to the observer as
//! [`ReceiveEvent::Fault`]. After
//! [`max_consecutive_faults`](ReceiveOptions::max_consecutive_faults) faults
//! in a row the loop gives up and [`ReceiveTask::join`] returns the last one.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

use crate::buffer::RxBuffer;
use crate::constants::{HEXDUMP_ROW_LEN, MAX_CONSECUTIVE_RX_FAULTS};
use crate::descriptor::RxDescriptor;
use crate::device::Device;
use crate::driver::{ChannelId, DmaDriver};
use crate::error::{Error, Result, TransferError, TransferResult};

/// Name of the receive thread
const THREAD_NAME: &str = "axidma-rx";

/// How often [`ReceiveTask::join_timeout`] checks for thread exit
const JOIN_POLL: Duration = Duration::from_millis(5);

// =============================================================================
// Stop Token
// =============================================================================

/// Cooperative stop request shared between the owner and the receive thread
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// Fresh, unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag, e.g. one registered with a signal handler
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// The underlying flag
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Request the loop to stop after the receive in flight returns
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Observers
// =============================================================================

/// One receive outcome as seen by an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveEvent<'a> {
    /// A completed receive; `bytes` may be empty
    Data {
        /// Channel the data arrived on
        channel: ChannelId,
        /// Received bytes
        bytes: &'a [u8],
    },
    /// The driver reported an error other than a timeout
    Fault {
        /// Channel the receive was issued on
        channel: ChannelId,
        /// The reported error
        error: TransferError,
    },
}

/// Consumer of receive outcomes, called on the receive thread
pub trait ReceiveObserver: Send {
    /// Handle one outcome
    fn observe(&mut self, event: ReceiveEvent<'_>);
}

impl<F> ReceiveObserver for F
where
    F: FnMut(ReceiveEvent<'_>) + Send,
{
    fn observe(&mut self, event: ReceiveEvent<'_>) {
        self(event);
    }
}

/// Prints each completion as `rec_len = N` followed by the bytes in rows of
/// sixteen `0xNN` values.
#[derive(Debug)]
pub struct HexDumpObserver<W> {
    out: W,
}

impl HexDumpObserver<io::Stdout> {
    /// Dump to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> HexDumpObserver<W> {
    /// Dump to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn dump(&mut self, bytes: &[u8]) -> io::Result<()> {
        write!(self.out, "\nrec_len = {}\n", bytes.len())?;
        for row in bytes.chunks(HEXDUMP_ROW_LEN) {
            for byte in row {
                write!(self.out, "0x{byte:02x} ")?;
            }
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ReceiveObserver for HexDumpObserver<W> {
    fn observe(&mut self, event: ReceiveEvent<'_>) {
        if let ReceiveEvent::Data { bytes, .. } = event
            && let Err(err) = self.dump(bytes)
        {
            warn!("hex dump write failed: {err}");
        }
    }
}

// =============================================================================
// Loop
// =============================================================================

/// Termination and fault policy for the receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Stop after this many successful completions
    pub limit: Option<usize>,
    /// Give up after this many faults in a row
    pub max_consecutive_faults: u32,
}

impl ReceiveOptions {
    /// Unlimited receives, default fault threshold
    pub const fn new() -> Self {
        Self {
            limit: None,
            max_consecutive_faults: MAX_CONSECUTIVE_RX_FAULTS,
        }
    }

    /// Stop after `limit` completions
    #[must_use]
    pub const fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Set the consecutive fault threshold (at least 1)
    #[must_use]
    pub const fn with_max_consecutive_faults(mut self, max: u32) -> Self {
        self.max_consecutive_faults = if max == 0 { 1 } else { max };
        self
    }
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters from a finished receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveSummary {
    /// Successful completions, including zero-length ones
    pub completions: usize,
    /// Total bytes received
    pub bytes: usize,
    /// Faults reported to the observer
    pub faults: usize,
    /// Driver timeouts
    pub timeouts: usize,
}

/// Receive loop body, run on the current thread
pub struct ReceiveLoop<'a, D: DmaDriver, O> {
    device: &'a Device<D>,
    desc: RxDescriptor,
    buffer: RxBuffer,
    observer: O,
    options: ReceiveOptions,
}

impl<'a, D: DmaDriver, O: ReceiveObserver> ReceiveLoop<'a, D, O> {
    /// Prepare a loop with its own receive buffer
    pub fn new(device: &'a Device<D>, desc: RxDescriptor, observer: O) -> Self {
        Self {
            device,
            desc,
            buffer: RxBuffer::new(),
            observer,
            options: ReceiveOptions::new(),
        }
    }

    /// Replace the termination policy
    #[must_use]
    pub fn with_options(mut self, options: ReceiveOptions) -> Self {
        self.options = options;
        self
    }

    /// Receive until `stop` is set, the limit is reached, or too many faults
    /// occur in a row.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ExceedsCapacity`] if the descriptor's output size
    ///   does not fit the receive buffer (before any receive is issued)
    /// - the last fault once the consecutive fault threshold is reached
    pub fn run(&mut self, stop: &StopToken) -> TransferResult<ReceiveSummary> {
        let channel = self.desc.channel();
        let mut summary = ReceiveSummary::default();
        let mut consecutive_faults = 0u32;

        debug!(
            "receive loop on channel {channel}, {} byte window",
            self.desc.output_size()
        );

        while !stop.is_stopped() {
            if self
                .options
                .limit
                .is_some_and(|limit| summary.completions >= limit)
            {
                debug!("receive limit of {} reached", summary.completions);
                break;
            }

            let window = self.buffer.window_mut(self.desc.output_size())?;
            match self.device.receive(&self.desc, window) {
                Ok(len) => {
                    consecutive_faults = 0;
                    summary.completions += 1;
                    summary.bytes += len;
                    trace!("received {len} bytes on channel {channel}");
                    self.observer.observe(ReceiveEvent::Data {
                        channel,
                        bytes: &window[..len],
                    });
                }
                Err(TransferError::TimedOut) => {
                    summary.timeouts += 1;
                }
                Err(err) => {
                    consecutive_faults += 1;
                    summary.faults += 1;
                    warn!("receive on channel {channel} failed: {err}");
                    self.observer
                        .observe(ReceiveEvent::Fault { channel, error: err });
                    if consecutive_faults >= self.options.max_consecutive_faults {
                        error!("giving up after {consecutive_faults} consecutive receive faults");
                        return Err(err);
                    }
                }
            }
        }

        debug!("receive loop finished: {summary:?}");
        Ok(summary)
    }
}

// =============================================================================
// Task
// =============================================================================

/// Owned receive thread
///
/// Drop stops and joins the thread.
#[derive(Debug)]
pub struct ReceiveTask {
    handle: Option<JoinHandle<TransferResult<ReceiveSummary>>>,
    stop: StopToken,
}

impl ReceiveTask {
    /// Start the receive loop on a new thread.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`] if the thread cannot be created.
    pub fn spawn<D, O>(
        device: Arc<Device<D>>,
        desc: RxDescriptor,
        observer: O,
        options: ReceiveOptions,
        stop: StopToken,
    ) -> Result<Self>
    where
        D: DmaDriver + 'static,
        O: ReceiveObserver + 'static,
    {
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                ReceiveLoop::new(&device, desc, observer)
                    .with_options(options)
                    .run(&thread_stop)
            })
            .map_err(|err| Error::Spawn(err.kind()))?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Token that stops this task
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Request the loop to stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Wait at most `grace` for the thread to exit.
    ///
    /// A driver receive without its own timeout can block indefinitely, so
    /// shutdown paths use this instead of [`join`](Self::join). If the thread
    /// is still running at the deadline it is detached: it keeps its `Arc` to
    /// the device until the blocked receive returns or the process exits.
    /// Does not request a stop.
    ///
    /// # Errors
    ///
    /// - [`Error::ReceiveStalled`] if the deadline passed
    /// - otherwise as [`join`](Self::join)
    pub fn join_timeout(mut self, grace: Duration) -> Result<ReceiveSummary> {
        let deadline = Instant::now() + grace;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                // Dropping the handle detaches the thread
                drop(self.handle.take());
                warn!("receive thread still blocked in the driver, detaching");
                return Err(Error::ReceiveStalled(grace.as_millis() as u64));
            }
            thread::sleep(JOIN_POLL.min(grace));
        }
        self.join()
    }

    /// Wait for the thread to exit.
    ///
    /// Does not request a stop; call [`stop`](Self::stop) first unless the
    /// loop ends on its own.
    ///
    /// # Errors
    ///
    /// - [`Error::Transfer`] if the loop gave up on faults
    /// - [`Error::TaskPanicked`] if the thread panicked
    pub fn join(mut self) -> Result<ReceiveSummary> {
        let Some(handle) = self.handle.take() else {
            return Ok(ReceiveSummary::default());
        };
        match handle.join() {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::TaskPanicked),
        }
    }
}

impl Drop for ReceiveTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.stop();
            if handle.join().is_err() {
                error!("receive thread panicked");
            }
        }
    }
}
