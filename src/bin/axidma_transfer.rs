//! AXI DMA duplex transfer tool.
//!
//! Sends the transmit schedule over the AXI DMA engine while a receive
//! thread dumps whatever comes back from the fabric.
//!
//! # Usage
//!
//! ```sh
//! axidma-transfer [-t <tx channel> -r <rx channel>] [-s <bytes> | -o <MiB>]
//! axidma-transfer --loopback --settle-ms 100 --receive-limit 3
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: stop receiving, destroy the device and exit. A
//!   receive stuck in the driver is abandoned after a grace period.
//! - A second `SIGTERM` / `SIGINT` exits immediately with status 1
//!
//! # Exit status
//!
//! 0 on success, the driver status for a failed send, 19 (`ENODEV`) when the
//! device has no channels, 1 for anything else.

use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};

use axidma_duplex::constants::{
    CONTROL_REG_BASE, CONTROL_REG_SPAN, DEFAULT_SETTLE_INTERVAL_MS, MAX_CONSECUTIVE_RX_FAULTS,
    RX_JOIN_GRACE_MS,
};
use axidma_duplex::error::DeviceResult;
use axidma_duplex::{
    ChannelSelection, DmaDriver, EnableConfig, EnableLatch, Error, HexDumpObserver,
    LoopbackDriver, MemoryRegion, ReceiveOptions, RegisterBlock, Result, Session, StdDelay,
    StopToken, TransferConfig, TransmitSchedule, logging, output_size_from_flags,
};

/// How often the main thread checks for a stop request while receiving
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Exit status on a repeated termination signal
const FORCED_EXIT: i32 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "axidma-transfer",
    version,
    about = "Full-duplex AXI DMA transfer over the libaxidma driver library"
)]
struct Args {
    /// DMA transmit channel id (requires -r)
    #[arg(short = 't', long = "tx-channel")]
    tx_channel: Option<i32>,

    /// DMA receive channel id (requires -t)
    #[arg(short = 'r', long = "rx-channel")]
    rx_channel: Option<i32>,

    /// Receive size in bytes (exclusive with -o)
    #[arg(short = 's', long = "output-bytes")]
    output_bytes: Option<usize>,

    /// Receive size in MiB (exclusive with -s)
    #[arg(short = 'o', long = "output-mib")]
    output_mib: Option<f64>,

    /// Use the in-process loopback engine instead of hardware
    #[arg(long)]
    loopback: bool,

    /// Wait between consecutive sends in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_INTERVAL_MS)]
    settle_ms: u32,

    /// Comma-separated payload lengths to send (default 1000,2000,1800)
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<usize>,

    /// Stop after this many received completions
    #[arg(long)]
    receive_limit: Option<usize>,

    /// Stop receiving after this many consecutive faults
    #[arg(long, default_value_t = MAX_CONSECUTIVE_RX_FAULTS)]
    max_faults: u32,

    /// Clear the DMA enable bit on exit
    #[arg(long)]
    clear_enable: bool,

    /// Physical base address of the DMA control registers
    #[arg(long, value_parser = parse_address, default_value_t = CONTROL_REG_BASE)]
    reg_base: u64,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn parse_address(arg: &str) -> std::result::Result<u64, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|err| format!("invalid address {arg:?}: {err}"))
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(err) = run(&args) {
        error!("{err}");
        eprintln!("axidma-transfer: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;

    let stop = StopToken::new();
    for signal in [SIGINT, SIGTERM] {
        // Exits on the second signal, once the flag is already set
        signal_hook::flag::register_conditional_shutdown(signal, FORCED_EXIT, stop.flag())
            .map_err(|err| Error::Signal(err.kind()))?;
        signal_hook::flag::register(signal, stop.flag())
            .map_err(|err| Error::Signal(err.kind()))?;
    }

    if args.loopback {
        let mut regs = MemoryRegion::new(CONTROL_REG_SPAN);
        run_session(config, || Ok(LoopbackDriver::new()), &mut regs, &stop)
    } else {
        run_hardware(config, args.reg_base, &stop)
    }
}

/// Turn the command line into a validated configuration.
fn build_config(args: &Args) -> Result<TransferConfig> {
    let channels = ChannelSelection::from_overrides(args.tx_channel, args.rx_channel)?;
    let output_size = output_size_from_flags(args.output_bytes, args.output_mib)?;
    let schedule = if args.sizes.is_empty() {
        TransmitSchedule::default()
    } else {
        TransmitSchedule::new(args.sizes.clone())?
    };

    let config = TransferConfig::new()
        .with_channels(channels)
        .with_output_size(output_size)
        .with_schedule(schedule)
        .with_settle_ms(args.settle_ms)
        .with_receive_options(
            ReceiveOptions::new()
                .with_limit(args.receive_limit)
                .with_max_consecutive_faults(args.max_faults),
        )
        .with_enable(EnableConfig::new().with_clear_on_teardown(args.clear_enable));
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "libaxidma")]
fn run_hardware(config: TransferConfig, reg_base: u64, stop: &StopToken) -> Result<()> {
    use axidma_duplex::constants::MEM_DEVICE_PATH;
    use axidma_duplex::{LibAxiDma, MappedRegion};

    let mut regs = MappedRegion::map(MEM_DEVICE_PATH, reg_base, CONTROL_REG_SPAN)?;
    run_session(config, LibAxiDma::init, &mut regs, stop)
}

#[cfg(not(feature = "libaxidma"))]
fn run_hardware(_config: TransferConfig, _reg_base: u64, _stop: &StopToken) -> Result<()> {
    error!("built without the `libaxidma` feature; rebuild with it or pass --loopback");
    Err(axidma_duplex::DeviceError::InitFailed.into())
}

/// Open, transmit, receive until stopped, then tear down.
///
/// Receiving starts only after the whole schedule was sent. The device is
/// destroyed even when the transmit fails.
fn run_session<D, F, R>(
    config: TransferConfig,
    init: F,
    regs: &mut R,
    stop: &StopToken,
) -> Result<()>
where
    D: DmaDriver + 'static,
    F: FnOnce() -> DeviceResult<D>,
    R: RegisterBlock,
{
    let latch = EnableLatch::process();
    let mut session = Session::open(config, init, regs, latch)?.with_stop_token(stop.clone());

    let (report, rx) = match session.run(&mut StdDelay::new(), HexDumpObserver::stdout()) {
        Ok(started) => started,
        Err(err) => {
            session.close(regs, latch);
            return Err(err);
        }
    };

    while !stop.is_stopped() && !rx.is_finished() {
        thread::sleep(WAIT_POLL);
    }
    let summary = session.shutdown(rx, Duration::from_millis(RX_JOIN_GRACE_MS), regs, latch)?;
    info!(
        "sent {} payloads ({} bytes), received {} ({} bytes, {} faults)",
        report.sends, report.bytes, summary.completions, summary.bytes, summary.faults
    );
    Ok(())
}
