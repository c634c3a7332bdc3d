//! Linebag - Line-Oriented Elastic Buffer
//!
//! Sits between one byte-stream producer and one byte-stream consumer,
//! absorbing bursts into a bounded ring of line-sized slots. Once every slot
//! is taken the producer is no longer read (backpressure) instead of memory
//! growing without bound.
//!
//! # Key Features
//!
//! - One contiguous allocation for all slots, made once at startup
//! - Partial reads and writes resume in place, byte-exact and in order
//! - Single-threaded, readiness-driven loop with one blocking point; the
//!   streams are switched to non-blocking mode for the duration of a run
//! - Pause/resume/terminate through signals read synchronously (`signalfd`)
//! - Graceful drain after producer end-of-stream
//!
//! # Example
//!
//! ```
//! use linebag::{Config, Ingest, RingBuffer};
//!
//! let mut ring = RingBuffer::new(Config::new(4, 64, false)).unwrap();
//!
//! let mut input: &[u8] = b"hello\n";
//! assert_eq!(ring.ingest(&mut input).unwrap(), Ingest::Sealed(6));
//!
//! let mut output: Vec<u8> = Vec::new();
//! ring.drain(&mut output).unwrap();
//! assert_eq!(output, b"hello\n");
//! ```

mod config;
mod control;
mod error;
mod event_loop;
mod invariants;
mod metrics;
mod nonblock;
mod poll;
mod ring;
#[cfg(target_os = "linux")]
mod signal;

pub use config::{
    parse_count, Config, DEFAULT_SLOT_CAPACITY, LARGE_CONFIG, LINE_MAX, LOG_LEVEL_ENV,
    SLOT_SIZE_ENV, SMALL_CONFIG,
};
pub use control::{Control, ControlSource};
pub use error::BagError;
pub use event_loop::{EventLoop, LoopState, Outcome};
pub use metrics::Metrics;
pub use nonblock::{is_nonblocking, NonBlocking};
pub use poll::{FdPoller, Interest, Poller, Readiness};
pub use ring::{Drain, Ingest, RingBuffer, SlotIndex};
#[cfg(target_os = "linux")]
pub use signal::{SignalBridge, HANDLED_SIGNALS};
