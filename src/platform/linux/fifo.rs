//! Named-pipe command receiver.
//!
//! The daemon listens on a FIFO so other programs (hotkey daemons, shell
//! scripts) can override the touchpad state with
//! `echo touchpad_toggle > /tmp/zenbook-duo-daemon.pipe`.
//!
//! The pipe is opened read-only. When the last writer disconnects the reader
//! sees end-of-file: any unterminated input is taken as a final line, and
//! the pipe is reopened so `poll` stops reporting the hangup. The new
//! descriptor is opened before the old one is closed, so a writer never
//! finds the pipe without a reader.

use super::{Readiness, poll_readable};
use crate::bus::EventBus;
use crate::command::{LineBuffer, OverrideCommand};
use crate::error::{Error, Result};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Permissions of the created pipe: owner read-write, everyone else write.
const PIPE_MODE: u32 = 0o622;

/// Receives override commands on a named pipe and publishes them on the bus.
pub struct CommandReceiver {
    path: PathBuf,
    bus: EventBus,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CommandReceiver {
    /// Create a receiver for `path`. Nothing is created until [`start`](Self::start).
    pub fn new(path: impl Into<PathBuf>, bus: EventBus) -> Self {
        Self {
            path: path.into(),
            bus,
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    /// Pipe location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fifo_err(&self, source: io::Error) -> Error {
        Error::Fifo {
            path: self.path.clone(),
            source,
        }
    }

    /// Create the pipe and start reading commands.
    ///
    /// Anything already at the path is removed first.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let file = match self.create() {
            Ok(file) => file,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let running = Arc::clone(&self.running);
        let bus = self.bus.clone();
        let path = self.path.clone();
        let spawned = thread::Builder::new()
            .name("command-pipe".into())
            .spawn(move || {
                if let Err(e) = read_loop(&path, file, &running, &bus) {
                    log::error!("command pipe {} stopped: {e}", path.display());
                }
            });

        match spawned {
            Ok(handle) => {
                *self
                    .thread
                    .lock()
                    .map_err(|_| Error::ThreadError("pipe mutex poisoned".into()))? = Some(handle);
                log::info!("listening for commands on {}", self.path.display());
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = fs::remove_file(&self.path);
                Err(Error::ThreadError(format!("failed to spawn pipe thread: {e}")))
            }
        }
    }

    fn create(&self) -> Result<File> {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("removed stale {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.fifo_err(e)),
        }

        mkfifo(&self.path, Mode::from_bits_truncate(PIPE_MODE))
            .map_err(|e| self.fifo_err(e.into()))?;
        // mkfifo applies the umask; set the mode explicitly.
        fs::set_permissions(&self.path, fs::Permissions::from_mode(PIPE_MODE))
            .map_err(|e| self.fifo_err(e))?;

        open_reader(&self.path).map_err(|e| self.fifo_err(e))
    }

    /// Stop reading and remove the pipe. Safe to call twice.
    pub fn stop(&self) -> Result<()> {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        let handle = self
            .thread
            .lock()
            .map_err(|_| Error::ThreadError("pipe mutex poisoned".into()))?
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| Error::ThreadError("failed to join pipe thread".into()))?;
        }

        if was_running {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.fifo_err(e)),
            }
            log::info!("command pipe {} removed", self.path.display());
        }
        Ok(())
    }

    /// Check if the receiver is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Non-blocking, so opening succeeds before any writer connects.
fn open_reader(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

fn read_loop(path: &Path, mut file: File, running: &AtomicBool, bus: &EventBus) -> io::Result<()> {
    let mut lines = LineBuffer::new();
    let mut buf = [0u8; 512];

    while running.load(Ordering::SeqCst) {
        match poll_readable(file.as_raw_fd())? {
            Readiness::Timeout => continue,
            Readiness::Ready => {}
        }

        let n = match file.read(&mut buf) {
            Ok(0) => {
                // Every writer has gone.
                file = open_reader(path)?;
                if let Some(line) = lines.finish() {
                    dispatch(&line, bus);
                }
                continue;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        for line in lines.push(&buf[..n]) {
            dispatch(&line, bus);
        }
    }

    Ok(())
}

fn dispatch(line: &str, bus: &EventBus) {
    match OverrideCommand::parse_line(line) {
        Ok(Some(command)) => {
            log::info!("received command {command}");
            bus.publish(command.event());
        }
        Ok(None) => {}
        Err(e) => log::warn!("ignoring pipe input: {e}"),
    }
}

/// Write one command to a running daemon's pipe.
///
/// Fails with `ENXIO` if no daemon has the pipe open.
pub fn send_command(path: &Path, command: OverrideCommand) -> Result<()> {
    let err = |source| Error::Fifo {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(path).map_err(err)?;
    if !metadata.file_type().is_fifo() {
        return Err(err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a named pipe",
        )));
    }

    let mut pipe = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(err)?;
    pipe.write_all(format!("{command}\n").as_bytes()).map_err(err)
}
