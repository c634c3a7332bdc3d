//! linebag - buffer lines between stdin and stdout.
//!
//! Usage: `linebag <number of lines>`
//!
//! SIGUSR1 pauses output, SIGUSR2 resumes it, SIGTERM and SIGINT exit.
//! `LINEBAG_SLOT_SIZE` overrides the slot size, `LINEBAG_LOG` the log level.

use anyhow::Context;
use linebag::{
    BagError, Config, EventLoop, FdPoller, Metrics, NonBlocking, Outcome, RingBuffer,
    SignalBridge, LOG_LEVEL_ENV, SLOT_SIZE_ENV,
};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, AsRawFd};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            let cause = err.downcast_ref::<BagError>();
            let operation = cause.map_or("setup", BagError::operation);
            if cause.map_or(true, BagError::is_startup) {
                error!(operation, "startup failed: {err:#}");
            } else {
                error!(operation, "buffering failed: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries the data stream.
fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("linebag: logging disabled: {err}");
    }
}

fn run() -> anyhow::Result<Outcome> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let slot_size = std::env::var(SLOT_SIZE_ENV).ok();

    // Nothing is allocated before the arguments are known to be good
    let config = Config::from_cli(&args, slot_size.as_deref())
        .context("invalid command line")?;

    let bridge = SignalBridge::install().context("installing signal handling")?;
    let ring = RingBuffer::new(config).context("allocating ring buffer")?;

    // Reads and writes go straight to the descriptors; the std handles
    // would buffer behind poll's back.
    let stdin = io::stdin();
    let stdout = io::stdout();
    let producer = File::from(
        stdin
            .as_fd()
            .try_clone_to_owned()
            .context("duplicating stdin")?,
    );
    let consumer = File::from(
        stdout
            .as_fd()
            .try_clone_to_owned()
            .context("duplicating stdout")?,
    );

    // A write larger than the free pipe space must not hold up the loop.
    // The guards restore the parent's flags on every return path.
    let _stdin_mode = NonBlocking::set(stdin.as_fd()).context("making stdin non-blocking")?;
    let _stdout_mode = NonBlocking::set(stdout.as_fd()).context("making stdout non-blocking")?;

    let poller = FdPoller::new(bridge.as_raw_fd(), producer.as_raw_fd(), consumer.as_raw_fd());
    info!(
        slots = config.slots,
        slot_capacity = config.slot_capacity,
        "buffering started"
    );

    let mut event_loop = EventLoop::new(ring, bridge, producer, consumer);
    let result = event_loop.run(poller);

    let (ring, ..) = event_loop.into_parts();
    log_summary(&ring.metrics());

    let outcome = result.context("event loop failed")?;
    match outcome {
        Outcome::Drained => info!("all input delivered"),
        Outcome::ConsumerHangup => info!("consumer went away"),
        Outcome::Terminated { signo } => info!(signo, "terminated by signal"),
    }
    Ok(outcome)
}

fn log_summary(metrics: &Metrics) {
    info!(
        bytes_in = metrics.bytes_in,
        bytes_out = metrics.bytes_out,
        buffered = metrics.buffered_bytes(),
        records = metrics.records_drained,
        partial_writes = metrics.partial_writes,
        stalls = metrics.producer_stalls,
        pauses = metrics.pauses,
        "summary"
    );
}
