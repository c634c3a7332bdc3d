//! Error types for linebag operations.

use std::io;
use thiserror::Error;

/// Errors that end the process.
///
/// Stream closures are not errors: a producer reaching end-of-stream and a
/// consumer hanging up are reported as [`Outcome`](crate::Outcome)s.
#[derive(Debug, Error)]
pub enum BagError {
    /// Wrong number of command-line arguments.
    #[error("expected exactly one argument: <number of lines>")]
    Usage,

    /// The slot count or slot size could not be used.
    #[error("{0}")]
    Argument(String),

    /// The ring's backing region could not be allocated.
    #[error("cannot allocate {slots} slots of {slot_capacity} bytes")]
    Allocation {
        /// Requested number of slots.
        slots: usize,
        /// Requested bytes per slot.
        slot_capacity: usize,
    },

    /// Blocking signals or creating the signal descriptor failed.
    #[error("signal setup failed: {0}")]
    SignalSetup(io::Error),

    /// Reading a pending control event failed.
    #[error("reading control event failed: {0}")]
    ControlSource(io::Error),

    /// Reading from the producer failed.
    #[error("read from producer failed: {0}")]
    ProducerIo(io::Error),

    /// Writing to the consumer failed.
    #[error("write to consumer failed: {0}")]
    ConsumerIo(io::Error),

    /// Waiting for readiness failed.
    #[error("readiness wait failed: {0}")]
    Poll(io::Error),
}

impl BagError {
    /// Returns `true` if the error happened before the event loop started.
    #[inline]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Usage | Self::Argument(_) | Self::Allocation { .. } | Self::SignalSetup(_)
        )
    }

    /// Short name of the failing operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Usage | Self::Argument(_) => "parse arguments",
            Self::Allocation { .. } => "allocate",
            Self::SignalSetup(_) => "signalfd",
            Self::ControlSource(_) => "read signal",
            Self::ProducerIo(_) => "read",
            Self::ConsumerIo(_) => "write",
            Self::Poll(_) => "poll",
        }
    }
}
