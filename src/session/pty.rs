//! PTY process runner: spawn one command on a pseudo-terminal and pump
//! its output until exit.
//!
//! Each command gets a fresh PTY pair. The child runs with stdin, stdout
//! and stderr on the subordinate side, in its own session, so interactive
//! tools (password prompts, progress bars, `sudo`) behave as on a real
//! terminal. The parent drops the subordinate side right after spawn and
//! reads the controlling side with a bounded poll, interleaving child-exit
//! checks so trailing output can be drained before teardown.

use std::io::Read;
use std::os::fd::RawFd;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use portable_pty::{
    native_pty_system, Child as _, ChildKiller as _, CommandBuilder, ExitStatus, MasterPty as _,
    PtyPair, PtySize, SlavePty as _,
};

use super::{OutputMux, Session};
use crate::constants::{EXIT_DRAIN_DELAY, PTY_CHUNK_SIZE, PTY_POLL_INTERVAL};

/// Open a new PTY pair with default dimensions.
fn open_pty() -> Result<PtyPair> {
    let pty_system = native_pty_system();
    let size = PtySize {
        rows: 24,
        cols: 80,
        pixel_width: 0,
        pixel_height: 0,
    };
    pty_system.openpty(size).context("Failed to open PTY")
}

/// Build the shell invocation for an opaque command string.
///
/// Commands come from the scan catalog as full shell lines (pipes,
/// redirects, `2>/dev/null`), so they run through `sh -c` rather than
/// being tokenized here.
fn shell_command(command: &str) -> CommandBuilder {
    let mut cmd = CommandBuilder::new("sh");
    cmd.arg("-c");
    cmd.arg(command);
    cmd
}

/// Bounded-wait readiness check on the controlling side.
///
/// Returns `Ok(true)` when a read will not block (data pending or
/// hangup — a hangup still needs a read to observe EOF / drain the last
/// bytes). `EINTR` is treated as "not ready" so the loop just comes
/// around again.
fn poll_readable(fd: RawFd, timeout: Duration) -> std::io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: pollfd points to a single valid struct for the duration of
    // the call, and nfds is 1.
    let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    if rc == 0 {
        return Ok(false);
    }
    Ok(pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

/// Read whatever is immediately available after child exit.
///
/// Zero-timeout polls in a tight loop until the channel is empty or
/// errors; output written just before exit would otherwise be truncated.
fn drain_remaining(fd: RawFd, reader: &mut Box<dyn Read + Send>, mux: &mut OutputMux) {
    let mut buf = [0u8; PTY_CHUNK_SIZE];
    loop {
        match poll_readable(fd, Duration::ZERO) {
            Ok(true) => match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => mux.emit(&String::from_utf8_lossy(&buf[..n])),
            },
            Ok(false) | Err(_) => break,
        }
    }
}

/// Run one command attached to a fresh PTY, forwarding output to `mux`.
///
/// Returns the child's exit status; a nonzero exit is not an error. An
/// `Err` means the command never ran (PTY allocation or spawn failure) —
/// the caller absorbs it into the stream and continues the run. I/O
/// failures on the channel after spawn end the read loop and are treated
/// as command completion.
///
/// The session's handles are attached for the lifetime of the read loop
/// and cleared on every exit path.
pub(crate) fn run_command(
    session: &Session,
    command: &str,
    mux: &mut OutputMux,
    budget: Option<Duration>,
) -> Result<ExitStatus> {
    let pair = open_pty()?;
    let mut child = pair
        .slave
        .spawn_command(shell_command(command))
        .with_context(|| format!("failed to spawn `{command}`"))?;
    // Subordinate side closes in the parent immediately; the child keeps
    // its own copies until exit, which is what produces EOF on the
    // controlling side afterwards.
    drop(pair.slave);

    let master = pair.master;
    let fd = master
        .as_raw_fd()
        .context("PTY master exposes no file descriptor")?;
    let mut reader = master
        .try_clone_reader()
        .context("failed to clone PTY reader")?;
    let writer = master.take_writer().context("failed to take PTY writer")?;

    session.attach(writer, child.clone_killer());
    let _teardown = scopeguard::guard((), |()| session.detach());

    let deadline = budget.map(|d| Instant::now() + d);
    let mut budget_spent = false;
    let mut observed_exit = None;
    let mut buf = [0u8; PTY_CHUNK_SIZE];

    loop {
        match poll_readable(fd, PTY_POLL_INTERVAL) {
            Ok(true) => match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => mux.emit(&String::from_utf8_lossy(&buf[..n])),
                Err(err) => {
                    log::debug!("PTY read ended: {err}");
                    break;
                }
            },
            Ok(false) => {}
            Err(err) => {
                log::debug!("PTY poll failed: {err}");
                break;
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                thread::sleep(EXIT_DRAIN_DELAY);
                drain_remaining(fd, &mut reader, mux);
                observed_exit = Some(status);
                break;
            }
            Ok(None) => {}
            Err(err) => {
                log::warn!("child status poll failed: {err}");
                break;
            }
        }

        if let Some(deadline) = deadline {
            if !budget_spent && Instant::now() >= deadline {
                budget_spent = true;
                mux.emit(&format!(
                    "\n[!] Command exceeded its time budget, terminating: {command}\n"
                ));
                if let Err(err) = session.kill_child() {
                    log::warn!("failed to kill over-budget child: {err}");
                }
                // The kill surfaces as EOF/exit on the next laps; the
                // normal drain path still runs.
            }
        }
    }

    let status = match observed_exit {
        Some(status) => status,
        // EOF or channel error before the exit poll saw it: the child is
        // gone or going; reap it.
        None => child.wait().context("failed to reap child")?,
    };

    log::debug!(
        "command `{command}` exited with code {}",
        status.exit_code()
    );
    Ok(status)
}
