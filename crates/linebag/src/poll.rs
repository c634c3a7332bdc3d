//! Readiness notification over the control, producer and consumer sources.

use std::io;
use std::os::fd::RawFd;

/// Which data streams the loop currently wants to hear about.
///
/// The control source is always watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    /// Wake when the producer is readable.
    pub producer: bool,
    /// Wake when the consumer is writable.
    pub consumer: bool,
}

/// Readiness of all three sources after one wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A control event is pending.
    pub control: bool,
    /// The producer has data, or a pending error, to read.
    pub producer_readable: bool,
    /// The producer's writer has gone away.
    pub producer_hangup: bool,
    /// The consumer accepts writes.
    pub consumer_writable: bool,
    /// The consumer's reader has gone away or the stream is in error.
    pub consumer_hangup: bool,
}

/// The single blocking point of the event loop.
pub trait Poller {
    /// Blocks until at least one source is ready, without a timeout.
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness>;
}

impl<P: Poller + ?Sized> Poller for &mut P {
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness> {
        (**self).wait(interest)
    }
}

const CONTROL: usize = 0;
const PRODUCER: usize = 1;
const CONSUMER: usize = 2;

/// [`Poller`] over three file descriptors using `poll(2)`.
///
/// When producer interest is off, the producer descriptor is left out of the
/// set entirely: a hung-up pipe reports `POLLHUP` regardless of the requested
/// events and would otherwise wake the loop forever. The consumer descriptor
/// stays in the set with an empty event mask so that a consumer hangup is
/// noticed even while output is paused.
#[derive(Debug)]
pub struct FdPoller {
    fds: [RawFd; 3],
}

impl FdPoller {
    /// Creates a poller for the given descriptors.
    ///
    /// The descriptors are borrowed, not owned: they must stay open for as
    /// long as the poller is used.
    pub fn new(control: RawFd, producer: RawFd, consumer: RawFd) -> Self {
        Self {
            fds: [control, producer, consumer],
        }
    }

    fn pollfds(&self, interest: Interest) -> [libc::pollfd; 3] {
        let entry = |fd: RawFd, events: libc::c_short| libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        [
            entry(self.fds[CONTROL], libc::POLLIN),
            if interest.producer {
                entry(self.fds[PRODUCER], libc::POLLIN)
            } else {
                // Negative descriptors are skipped by poll(2)
                entry(-1, 0)
            },
            entry(
                self.fds[CONSUMER],
                if interest.consumer { libc::POLLOUT } else { 0 },
            ),
        ]
    }
}

impl Poller for FdPoller {
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness> {
        let mut fds = self.pollfds(interest);
        loop {
            // SAFETY: fds is a live array of exactly fds.len() pollfd entries.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }

        if let Some(bad) = fds.iter().find(|p| p.revents & libc::POLLNVAL != 0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("descriptor {} is not open", bad.fd),
            ));
        }

        Ok(readiness_from(&fds))
    }
}

fn readiness_from(fds: &[libc::pollfd; 3]) -> Readiness {
    let has = |i: usize, mask: libc::c_short| fds[i].revents & mask != 0;
    Readiness {
        // An errored signalfd is surfaced by the read that follows
        control: has(CONTROL, libc::POLLIN | libc::POLLERR),
        producer_readable: has(PRODUCER, libc::POLLIN | libc::POLLERR),
        producer_hangup: has(PRODUCER, libc::POLLHUP),
        consumer_writable: has(CONSUMER, libc::POLLOUT),
        consumer_hangup: has(CONSUMER, libc::POLLHUP | libc::POLLERR),
    }
}
