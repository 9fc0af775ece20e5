//! Bindings to the C `libaxidma` driver library
//!
//! Only built with the `libaxidma` feature. The library owns the device
//! file, the descriptor submission and the completion wait; this module
//! adapts its handle and its `struct dma_transfer` calling convention to
//! [`DmaDriver`].

use core::ffi::{c_int, c_void};
use core::ptr::{self, NonNull};

use log::debug;

use super::{ChannelId, DmaDriver};
use crate::descriptor::{RxDescriptor, TxDescriptor};
use crate::error::{DeviceError, DeviceResult, TransferError, TransferResult};

/// Opaque `struct axidma_dev`
#[allow(dead_code)]
#[repr(C)]
struct AxidmaDev {
    _private: [u8; 0],
}

/// `array_t` as returned by the channel queries
#[allow(dead_code)]
#[repr(C)]
struct ArrayT {
    len: c_int,
    data: *const c_int,
}

/// `struct dma_transfer` as consumed by `axidma0send` / `axidma0read`
///
/// The fd and buffer fields are unused by the two calls and stay at their
/// sentinel values.
#[allow(dead_code)]
#[repr(C)]
struct DmaTransfer {
    input_fd: c_int,
    input_channel: c_int,
    input_size: c_int,
    input_buf: *mut c_void,
    output_fd: c_int,
    output_channel: c_int,
    output_size: c_int,
    output_buf: *mut c_void,
}

impl DmaTransfer {
    const fn unused() -> Self {
        Self {
            input_fd: -1,
            input_channel: -1,
            input_size: 0,
            input_buf: ptr::null_mut(),
            output_fd: -1,
            output_channel: -1,
            output_size: 0,
            output_buf: ptr::null_mut(),
        }
    }
}

#[link(name = "axidma")]
unsafe extern "C" {
    fn axidma_init() -> *mut AxidmaDev;
    fn axidma_destroy(dev: *mut AxidmaDev);
    fn axidma_get_dma_tx(dev: *mut AxidmaDev) -> *const ArrayT;
    fn axidma_get_dma_rx(dev: *mut AxidmaDev) -> *const ArrayT;
    fn axidma0send(dev: *mut AxidmaDev, trans: *mut DmaTransfer, buf: *mut u8) -> c_int;
    fn axidma0read(dev: *mut AxidmaDev, trans: *mut DmaTransfer, buf: *mut u8) -> c_int;
}

/// Copy a driver-owned channel array.
///
/// # Safety
/// `array` must be null or point at a valid `array_t` whose `data` holds
/// `len` ints.
unsafe fn channel_list(array: *const ArrayT) -> Vec<ChannelId> {
    // SAFETY: guaranteed by the caller.
    let Some(array) = (unsafe { array.as_ref() }) else {
        return Vec::new();
    };
    if array.len <= 0 || array.data.is_null() {
        return Vec::new();
    }
    // SAFETY: guaranteed by the caller.
    let ids = unsafe { core::slice::from_raw_parts(array.data, array.len as usize) };
    ids.iter().copied().map(ChannelId).collect()
}

fn status(rc: c_int) -> TransferResult<usize> {
    if rc < 0 {
        Err(TransferError::Rejected { status: rc })
    } else {
        Ok(rc as usize)
    }
}

/// Device handle from `libaxidma`
#[derive(Debug)]
pub struct LibAxiDma {
    dev: NonNull<AxidmaDev>,
    tx: Vec<ChannelId>,
    rx: Vec<ChannelId>,
}

// SAFETY: the library serializes access per channel; transmit and receive
// channels are independent lanes and the handle itself is never mutated
// outside `destroy`, which requires `&mut self`.
unsafe impl Send for LibAxiDma {}
// SAFETY: see above.
unsafe impl Sync for LibAxiDma {}

impl LibAxiDma {
    /// `initialize-device`: open the AXI DMA device.
    ///
    /// # Errors
    ///
    /// [`DeviceError::InitFailed`] if the library returns a null handle.
    pub fn init() -> DeviceResult<Self> {
        // SAFETY: plain library call without arguments.
        let dev = NonNull::new(unsafe { axidma_init() }).ok_or(DeviceError::InitFailed)?;

        // SAFETY: `dev` is a live handle; the arrays stay valid while it is.
        let (tx, rx) = unsafe {
            (
                channel_list(axidma_get_dma_tx(dev.as_ptr())),
                channel_list(axidma_get_dma_rx(dev.as_ptr())),
            )
        };
        debug!("libaxidma: tx channels {tx:?}, rx channels {rx:?}");

        Ok(Self { dev, tx, rx })
    }
}

impl DmaDriver for LibAxiDma {
    fn tx_channels(&self) -> &[ChannelId] {
        &self.tx
    }

    fn rx_channels(&self) -> &[ChannelId] {
        &self.rx
    }

    fn send(&self, desc: &TxDescriptor, payload: &[u8]) -> TransferResult<usize> {
        if desc.input_size() > payload.len() {
            return Err(TransferError::ExceedsCapacity {
                requested: desc.input_size(),
                capacity: payload.len(),
            });
        }
        let mut trans = DmaTransfer::unused();
        trans.input_channel = desc.channel().0;
        trans.input_size = desc.input_size() as c_int;

        // SAFETY: the library reads `input_size` bytes from `payload`, which
        // holds at least that many; it does not write through the pointer.
        let rc = unsafe { axidma0send(self.dev.as_ptr(), &mut trans, payload.as_ptr().cast_mut()) };
        status(rc)
    }

    fn receive(&self, desc: &RxDescriptor, buffer: &mut [u8]) -> TransferResult<usize> {
        if desc.output_size() > buffer.len() {
            return Err(TransferError::ExceedsCapacity {
                requested: desc.output_size(),
                capacity: buffer.len(),
            });
        }
        let mut trans = DmaTransfer::unused();
        trans.output_channel = desc.channel().0;
        trans.output_size = desc.output_size() as c_int;

        // SAFETY: the library writes at most `output_size` bytes, which fits
        // `buffer`.
        let rc = unsafe { axidma0read(self.dev.as_ptr(), &mut trans, buffer.as_mut_ptr()) };
        status(rc).map(|len| len.min(buffer.len()))
    }

    fn destroy(&mut self) {
        // SAFETY: called once by `Device`; the handle is not used afterwards.
        unsafe { axidma_destroy(self.dev.as_ptr()) };
    }
}
