//! Signal delivery through a `signalfd` descriptor.
//!
//! Handled signals are blocked for the calling thread and read synchronously
//! from a descriptor polled alongside the data streams, so no handler code
//! ever runs while the ring is being modified.

use crate::control::{Control, ControlSource};
use crate::BagError;
use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use tracing::debug;

/// Signals routed to the control source.
pub const HANDLED_SIGNALS: [i32; 4] = [libc::SIGTERM, libc::SIGINT, libc::SIGUSR1, libc::SIGUSR2];

/// Converts process signals into [`Control`] events.
#[derive(Debug)]
pub struct SignalBridge {
    fd: OwnedFd,
}

impl SignalBridge {
    /// Blocks [`HANDLED_SIGNALS`], ignores SIGPIPE and opens the descriptor.
    ///
    /// Must run before any other thread is spawned, since the signal mask is
    /// inherited and a thread that leaves the signals unblocked would receive
    /// them with their default disposition.
    pub fn install() -> Result<Self, BagError> {
        // SAFETY: sigset_t is a plain C struct for which all-zero is a valid
        // value, and sigemptyset initialises it fully before use.
        let mut mask: libc::sigset_t = unsafe { mem::zeroed() };
        // SAFETY: mask points to a live sigset_t.
        unsafe {
            libc::sigemptyset(&mut mask);
            for signo in HANDLED_SIGNALS {
                libc::sigaddset(&mut mask, signo);
            }
        }

        // SAFETY: mask is initialised; the old mask is not requested.
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &mask, ptr::null_mut()) };
        if rc != 0 {
            return Err(BagError::SignalSetup(io::Error::from_raw_os_error(rc)));
        }

        // Writes to a vanished consumer surface as EPIPE instead of killing us
        // SAFETY: SIG_IGN is a valid disposition for SIGPIPE.
        if unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) } == libc::SIG_ERR {
            return Err(BagError::SignalSetup(io::Error::last_os_error()));
        }

        // SAFETY: -1 requests a new descriptor; mask is initialised.
        let raw = unsafe { libc::signalfd(-1, &mask, libc::SFD_CLOEXEC) };
        if raw < 0 {
            return Err(BagError::SignalSetup(io::Error::last_os_error()));
        }
        debug!(fd = raw, "signalfd installed");

        // SAFETY: signalfd returned a fresh descriptor that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self { fd })
    }
}

impl ControlSource for SignalBridge {
    fn recv(&mut self) -> io::Result<Control> {
        // SAFETY: signalfd_siginfo is a plain C struct; all-zero is valid.
        let mut info: libc::signalfd_siginfo = unsafe { mem::zeroed() };
        let size = mem::size_of::<libc::signalfd_siginfo>();

        // SAFETY: info is a writable buffer of exactly `size` bytes.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                ptr::addr_of_mut!(info).cast::<libc::c_void>(),
                size,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if n as usize != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short signalfd read: {n} of {size} bytes"),
            ));
        }

        let signo = info.ssi_signo as i32;
        Control::from_signal(signo).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected signal {signo}"),
            )
        })
    }
}

impl AsFd for SignalBridge {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for SignalBridge {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
