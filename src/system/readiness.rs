// src/system/readiness.rs

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io;
use std::os::fd::AsFd;

/// Waits up to `timeout_ms` for `source` to have something to read.
///
/// Hang-up and error conditions count as readable, so the read that follows reports them. An
/// interrupted wait counts as a timeout.
pub(crate) fn wait_readable<F: AsFd>(source: &F, timeout_ms: u16) -> io::Result<bool> {
    let mut fds = [PollFd::new(source.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(timeout_ms)) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => Ok(true),
        Err(errno) => Err(io::Error::from(errno)),
    }
}
