//! One-byte readiness signals over an anonymous pipe.
//!
//! A producer that shares a path-keyed segment with a forked or spawned
//! consumer can announce "segment written" by sending one byte; the consumer
//! waits for it with [`SignalReceiver::recv_timeout`]. Both descriptors are
//! inherited across `fork(2)`.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Write end of a signal pipe.
#[derive(Debug)]
pub struct SignalSender {
    file: File,
}

/// Read end of a signal pipe.
#[derive(Debug)]
pub struct SignalReceiver {
    file: File,
}

/// Create a connected sender/receiver pair.
pub fn signal_pipe() -> Result<(SignalSender, SignalReceiver)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    // SAFETY: `fds` is a writable array of two descriptors as pipe(2) requires.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc == -1 {
        return Err(TransportError::Io(std::io::Error::last_os_error()));
    }

    // SAFETY: pipe(2) succeeded, so both descriptors are open and owned by nobody else.
    let (read_end, write_end) =
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    debug!(read_fd = fds[0], write_fd = fds[1], "created signal pipe");
    Ok((SignalSender::from(write_end), SignalReceiver::from(read_end)))
}

impl SignalSender {
    /// Send one signal byte.
    pub fn send(&mut self, signal: u8) -> Result<()> {
        loop {
            match self.file.write(&[signal]) {
                Ok(1) => return Ok(()),
                Ok(_) => return Err(TransportError::Io(ErrorKind::WriteZero.into())),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl SignalReceiver {
    /// Block until one signal byte arrives.
    ///
    /// Fails with an `UnexpectedEof` I/O error once every sender is closed.
    pub fn recv(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.file.read(&mut byte) {
                Ok(1) => return Ok(byte[0]),
                Ok(_) => return Err(TransportError::Io(ErrorKind::UnexpectedEof.into())),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Wait at most `timeout` for one signal byte.
    ///
    /// Returns [`TransportError::Timeout`] if nothing arrives in time.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<u8> {
        let deadline = Instant::now() + timeout;
        let mut fds = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let millis = remaining.as_millis().min(i32::MAX as u128) as libc::c_int;
            // SAFETY: `fds` is a valid, writable pollfd and the count is 1.
            let rc = unsafe { libc::poll(&mut fds, 1, millis) };
            match rc {
                0 => return Err(TransportError::Timeout(timeout)),
                // POLLHUP without data also lands here; recv reports the EOF.
                n if n > 0 => return self.recv(),
                _ => {
                    let err = std::io::Error::last_os_error();
                    if err.kind() != ErrorKind::Interrupted {
                        return Err(TransportError::Io(err));
                    }
                }
            }
        }
    }
}

impl From<OwnedFd> for SignalSender {
    fn from(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }
}

impl From<OwnedFd> for SignalReceiver {
    fn from(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }
}

impl AsRawFd for SignalSender {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsRawFd for SignalReceiver {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn signal_byte_is_delivered() {
        let (mut tx, mut rx) = signal_pipe().unwrap();
        tx.send(b'R').unwrap();
        assert_eq!(rx.recv().unwrap(), b'R');
    }

    #[test]
    fn timed_receive_waits_for_sender() {
        let (mut tx, mut rx) = signal_pipe().unwrap();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            tx.send(7).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn timed_receive_times_out() {
        let (_tx, mut rx) = signal_pipe().unwrap();

        let started = Instant::now();
        let err = rx.recv_timeout(Duration::from_millis(200)).unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn closed_sender_is_eof() {
        let (tx, mut rx) = signal_pipe().unwrap();
        drop(tx);

        let err = rx.recv_timeout(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof
        ));
    }
}
