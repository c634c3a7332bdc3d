//! Scoped `O_NONBLOCK` on descriptors shared with the parent process.
//!
//! Status flags belong to the open file description, not to the descriptor,
//! so a `dup` of stdin or stdout shares them with whoever spawned us. The
//! guard records the flags it found and puts them back when dropped.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use tracing::{debug, warn};

/// Holds a descriptor in non-blocking mode until dropped.
#[derive(Debug)]
pub struct NonBlocking<'fd> {
    fd: BorrowedFd<'fd>,
    saved: libc::c_int,
}

impl<'fd> NonBlocking<'fd> {
    /// Sets `O_NONBLOCK` on `fd`, remembering the previous status flags.
    pub fn set(fd: BorrowedFd<'fd>) -> io::Result<Self> {
        let saved = get_flags(fd.as_raw_fd())?;
        if saved & libc::O_NONBLOCK == 0 {
            set_flags(fd.as_raw_fd(), saved | libc::O_NONBLOCK)?;
        }
        debug!(fd = fd.as_raw_fd(), "descriptor set non-blocking");
        Ok(Self { fd, saved })
    }

    /// Status flags found on the descriptor before the guard was taken.
    #[inline]
    pub fn saved_flags(&self) -> libc::c_int {
        self.saved
    }
}

impl AsFd for NonBlocking<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd
    }
}

impl Drop for NonBlocking<'_> {
    fn drop(&mut self) {
        if self.saved & libc::O_NONBLOCK != 0 {
            return;
        }
        if let Err(err) = set_flags(self.fd.as_raw_fd(), self.saved) {
            warn!(fd = self.fd.as_raw_fd(), error = %err, "restoring descriptor flags failed");
        }
    }
}

/// Returns `true` if `fd` has `O_NONBLOCK` set.
pub fn is_nonblocking(fd: BorrowedFd<'_>) -> io::Result<bool> {
    Ok(get_flags(fd.as_raw_fd())? & libc::O_NONBLOCK != 0)
}

fn get_flags(fd: RawFd) -> io::Result<libc::c_int> {
    // SAFETY: F_GETFL takes no argument and only reads descriptor state.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

fn set_flags(fd: RawFd, flags: libc::c_int) -> io::Result<()> {
    // SAFETY: F_SETFL takes an int argument; invalid bits are ignored.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::{FromRawFd, OwnedFd};

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        // SAFETY: fds has room for the two descriptors pipe(2) returns.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        assert_eq!(rc, 0, "pipe2 failed: {}", io::Error::last_os_error());
        // SAFETY: both descriptors are fresh and owned by nobody else.
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn test_flag_is_set_and_restored_through_dup() {
        let (rx, _tx) = pipe();
        let dup = rx.try_clone().unwrap();

        {
            let guard = NonBlocking::set(dup.as_fd()).unwrap();
            assert_eq!(guard.saved_flags() & libc::O_NONBLOCK, 0);
            // Shared file description: the original sees the flag too
            assert!(is_nonblocking(rx.as_fd()).unwrap());
        }

        assert!(!is_nonblocking(rx.as_fd()).unwrap());
        assert!(!is_nonblocking(dup.as_fd()).unwrap());
    }

    #[test]
    fn test_already_nonblocking_is_left_alone() {
        let (rx, _tx) = pipe();
        let flags = get_flags(rx.as_raw_fd()).unwrap();
        set_flags(rx.as_raw_fd(), flags | libc::O_NONBLOCK).unwrap();

        drop(NonBlocking::set(rx.as_fd()).unwrap());
        assert!(is_nonblocking(rx.as_fd()).unwrap());
    }

    #[test]
    fn test_full_pipe_write_would_block() {
        use std::fs::File;
        use std::io::Write;

        let (_rx, tx) = pipe();
        let _guard = NonBlocking::set(tx.as_fd()).unwrap();
        let mut writer = File::from(tx.try_clone().unwrap());

        // Fill the pipe, then one more write must not wait for a reader
        let chunk = vec![b'x'; 1 << 16];
        let err = loop {
            match writer.write(&chunk) {
                Ok(n) => assert!(n > 0),
                Err(err) => break err,
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
