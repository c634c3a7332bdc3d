//! Control events delivered to the event loop from outside the data path.

use std::io;

/// One external control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop the loop and release the buffer.
    Terminate {
        /// Signal number that requested termination.
        signo: i32,
    },
    /// Stop writing to the consumer.
    Pause,
    /// Start writing to the consumer again.
    Resume,
}

impl Control {
    /// Maps a process signal onto a control request.
    ///
    /// SIGTERM and SIGINT terminate, SIGUSR1 pauses and SIGUSR2 resumes.
    pub fn from_signal(signo: i32) -> Option<Self> {
        match signo {
            libc::SIGTERM | libc::SIGINT => Some(Self::Terminate { signo }),
            libc::SIGUSR1 => Some(Self::Pause),
            libc::SIGUSR2 => Some(Self::Resume),
            _ => None,
        }
    }
}

/// A readable source of control events.
///
/// The event loop calls [`recv`](ControlSource::recv) once per cycle in which
/// the source was reported ready. Any error is fatal to the loop.
pub trait ControlSource {
    /// Reads one pending control event.
    fn recv(&mut self) -> io::Result<Control>;
}

impl<C: ControlSource + ?Sized> ControlSource for &mut C {
    fn recv(&mut self) -> io::Result<Control> {
        (**self).recv()
    }
}
