//! Interactive scan session management.
//!
//! One [`Session`] exists per process. It owns the run-state machine and
//! the live PTY handles, and is shared by `Arc` between the HTTP serving
//! tasks and the background sequencer thread.
//!
//! # Architecture
//!
//! ```text
//! Session (state machine + handles)
//!  ├── state: AtomicU8 (Idle | Running | CancelRequested)
//!  └── handles: Mutex<SessionHandles>
//!       ├── writer: Write     (controlling side, input injection)
//!       └── child:  ChildKiller (forced termination on budget expiry)
//! ```
//!
//! `start_run` claims the session with a compare-and-swap and spawns one
//! sequencer thread; the returned channel receiver is the run's output
//! queue. All per-command handles are attached by the PTY runner and
//! cleared on every exit path, so `send_input` observes either a live
//! writer or `NoActiveSession` — never a stale one.
//!
//! # Concurrency
//!
//! The handle mutex is held only for the duration of a single write or an
//! attach/clear. The PTY read side never takes it: the reader is cloned
//! off the master before the handles are attached, so output pumping and
//! input injection are independent directions on the same duplex channel.

mod pty;
mod sequencer;
mod transcript;

pub use transcript::OutputMux;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use portable_pty::ChildKiller;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// One value on the run's output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of decoded terminal output (may embed a banner).
    Chunk(String),
    /// Sentinel: the run is over, no further chunks will arrive.
    EndOfSession,
}

/// Run state of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// No run in progress; `start_run` will be accepted.
    Idle = 0,
    /// A sequencer thread is executing the command list.
    Running = 1,
    /// Stop requested; observed at the next command boundary.
    CancelRequested = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::CancelRequested,
            _ => Self::Idle,
        }
    }

    /// Lowercase name used by the health endpoint and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::CancelRequested => "cancel_requested",
        }
    }
}

/// Why a run could not be started.
#[derive(Debug)]
pub enum StartError {
    /// Another run is active; retry once the session is idle.
    Busy,
    /// The run was accepted but its resources could not be set up
    /// (transcript file, sequencer thread). The session is back to idle.
    Setup(anyhow::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "a scan is already in progress"),
            Self::Setup(err) => write!(f, "failed to set up scan session: {err:#}"),
        }
    }
}

impl std::error::Error for StartError {}

/// Why injected input could not be delivered.
#[derive(Debug)]
pub enum InputError {
    /// No run is active, or no command currently holds the terminal.
    NoActiveSession,
    /// The write to the controlling side failed. This covers the narrow
    /// race where input lands just after a command's teardown.
    Write(std::io::Error),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActiveSession => write!(f, "no active interactive session"),
            Self::Write(err) => write!(f, "failed to write to process: {err}"),
        }
    }
}

impl std::error::Error for InputError {}

/// Everything the sequencer needs to execute one run.
#[derive(Debug)]
pub struct RunSpec {
    /// Shell commands, executed in order.
    pub commands: Vec<String>,
    /// Diagnostic notes emitted right after the session header (e.g.
    /// skipped tools from the scan catalog).
    pub notes: Vec<String>,
    /// Append-only transcript destination.
    pub transcript_path: PathBuf,
    /// Optional per-command wall-clock budget; expiry kills the child's
    /// process group and the run continues with the next command.
    pub command_budget: Option<Duration>,
}

/// Hook invoked after the command list completes, before the sentinel.
///
/// Receives the transcript path and the multiplexer so it can report
/// progress to the live stream. Used to plug in transcript notarization
/// without a second executor code path.
pub type PostRunHook = Box<dyn FnOnce(&std::path::Path, &mut OutputMux) + Send + 'static>;

/// Live handles of the currently executing command.
struct SessionHandles {
    /// Controlling-side writer for input injection.
    writer: Option<Box<dyn Write + Send>>,
    /// Killer for the attached child, used by the wall-clock budget.
    child: Option<Box<dyn ChildKiller + Send + Sync>>,
}

impl fmt::Debug for SessionHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandles")
            .field("has_writer", &self.writer.is_some())
            .field("has_child", &self.child.is_some())
            .finish()
    }
}

/// The process-wide interactive session.
///
/// See the module docs for the ownership story. All methods are safe to
/// call from any thread.
#[derive(Debug)]
pub struct Session {
    state: AtomicU8,
    handles: Mutex<SessionHandles>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an idle session with no attached handles.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
            handles: Mutex::new(SessionHandles {
                writer: None,
                child: None,
            }),
        }
    }

    /// Current run state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while a sequencer thread is running (including a pending stop).
    pub fn is_active(&self) -> bool {
        self.state() != SessionState::Idle
    }

    /// Start executing `spec` on a background thread.
    ///
    /// First-come-first-served: the state moves `Idle -> Running` with a
    /// compare-and-swap *before* the thread spawns, so a racing second
    /// caller deterministically observes [`StartError::Busy`]. On success
    /// the returned receiver yields the run's output in production order,
    /// terminated by [`StreamEvent::EndOfSession`].
    pub fn start_run(
        self: &Arc<Self>,
        spec: RunSpec,
        post_run: Option<PostRunHook>,
    ) -> Result<UnboundedReceiver<StreamEvent>, StartError> {
        if self
            .state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(StartError::Busy);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mux = match OutputMux::create(&spec.transcript_path, tx) {
            Ok(mux) => mux,
            Err(err) => {
                self.finish();
                return Err(StartError::Setup(err));
            }
        };

        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("opscan-sequencer".to_string())
            .spawn(move || sequencer::run(&session, &spec, mux, post_run));
        if let Err(err) = spawned {
            self.finish();
            return Err(StartError::Setup(err.into()));
        }

        Ok(rx)
    }

    /// Request cancellation of the active run.
    ///
    /// Returns true if the transition `Running -> CancelRequested` was
    /// made. The request is observed at the next command boundary; the
    /// command in progress is never preempted.
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Running as u8,
                SessionState::CancelRequested as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Write caller-supplied text into the running command's terminal.
    ///
    /// A trailing newline is appended if absent, since line-disciplined
    /// programs only see input on newline. Valid only while a run is
    /// active and a command holds the terminal.
    pub fn send_input(&self, text: &str) -> Result<(), InputError> {
        if !self.is_active() {
            return Err(InputError::NoActiveSession);
        }

        let mut handles = self.handles.lock().expect("session handles lock poisoned");
        let writer = handles
            .writer
            .as_mut()
            .ok_or(InputError::NoActiveSession)?;

        let mut payload = text.to_owned();
        if !payload.ends_with('\n') {
            payload.push('\n');
        }
        writer
            .write_all(payload.as_bytes())
            .map_err(InputError::Write)?;
        writer.flush().map_err(InputError::Write)?;
        Ok(())
    }

    /// Attach the per-command handles. Called by the PTY runner after
    /// spawn, before entering the read loop.
    pub(crate) fn attach(
        &self,
        writer: Box<dyn Write + Send>,
        child: Box<dyn ChildKiller + Send + Sync>,
    ) {
        let mut handles = self.handles.lock().expect("session handles lock poisoned");
        handles.writer = Some(writer);
        handles.child = Some(child);
    }

    /// Clear the per-command handles. Runs on every exit path of the PTY
    /// runner, regardless of how the read loop ended.
    pub(crate) fn detach(&self) {
        let mut handles = self.handles.lock().expect("session handles lock poisoned");
        handles.writer = None;
        handles.child = None;
    }

    /// Kill the attached child's process group.
    pub(crate) fn kill_child(&self) -> std::io::Result<()> {
        let mut handles = self.handles.lock().expect("session handles lock poisoned");
        match handles.child.as_mut() {
            Some(child) => child.kill(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no child attached",
            )),
        }
    }

    /// Return to idle. Called by the sequencer once the sentinel has been
    /// queued, and by `start_run` when setup fails after the claim.
    pub(crate) fn finish(&self) {
        self.state
            .store(SessionState::Idle as u8, Ordering::Release);
    }
}
