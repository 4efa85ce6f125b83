//! Linux evdev backend.
//!
//! Touchpads and keyboards are read from `/dev/input/event*`, which works on
//! both X11 and Wayland. Access requires root or membership in the `input`
//! group:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

mod device;
mod fifo;
mod keyboard;

pub use device::EvdevOpener;
pub use fifo::{CommandReceiver, send_command};
pub use keyboard::KeyboardMonitor;

use std::io;
use std::os::unix::io::RawFd;

/// Poll interval used by the reader threads to notice a stop request.
const POLL_TIMEOUT_MS: libc::c_int = 100;

/// Outcome of waiting on a single descriptor.
enum Readiness {
    Ready,
    Timeout,
}

/// Wait up to [`POLL_TIMEOUT_MS`] for `fd` to become readable.
///
/// `EINTR` is reported as a timeout so callers just loop again.
fn poll_readable(fd: RawFd) -> io::Result<Readiness> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let ret = unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Readiness::Timeout);
        }
        return Err(err);
    }
    if ret == 0 {
        return Ok(Readiness::Timeout);
    }
    if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
        return Err(io::Error::other(format!(
            "poll reported revents {:#x}",
            pfd.revents
        )));
    }
    Ok(Readiness::Ready)
}
