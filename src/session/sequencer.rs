//! Command sequencer: the background thread body of one run.
//!
//! Iterates the command list one at a time, framing each command with an
//! `Executing:` banner and absorbing per-command failures so one broken
//! command never aborts the run. Cancellation is cooperative and coarse:
//! the state flag is checked only at command boundaries, never mid-command.
//!
//! Completion is guaranteed on every exit path — including a panic inside
//! a command runner — by a scope guard that queues the sentinel and
//! returns the session to idle. Without it a fault here would leave the
//! consumer waiting on its idle fallback and the session stuck busy.

use std::sync::Arc;

use super::{pty, OutputMux, PostRunHook, RunSpec, Session, SessionState, StreamEvent};

/// Timestamp format shared by the session header and command banners.
fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Execute `spec` to completion. Runs on a dedicated thread; the session
/// state is already `Running` when this is entered.
pub(crate) fn run(
    session: &Arc<Session>,
    spec: &RunSpec,
    mut mux: OutputMux,
    post_run: Option<PostRunHook>,
) {
    let completion = scopeguard::guard(
        (Arc::clone(session), mux.sender()),
        |(session, sender)| {
            let _ = sender.send(StreamEvent::EndOfSession);
            session.finish();
        },
    );

    mux.emit(&format!("\n=== SESSION STARTED: {} ===\n", timestamp()));
    for note in &spec.notes {
        mux.emit(note);
    }

    for command in &spec.commands {
        if session.state() != SessionState::Running {
            log::info!("stop requested, ending run at command boundary");
            break;
        }

        let ts = timestamp();
        mux.emit_styled(
            &format!("\n[{ts}] Executing: {command}\n"),
            format!("\n\x1b[1;36m[{ts}] Executing: {command}\x1b[0m\n"),
        );

        match pty::run_command(session, command, &mut mux, spec.command_budget) {
            Ok(status) => {
                // Nonzero exit is a finding, not a fault; the stream
                // already carries whatever the tool printed.
                log::info!(
                    "command `{command}` completed (exit code {})",
                    status.exit_code()
                );
            }
            Err(err) => {
                log::warn!("command `{command}` failed to start: {err:#}");
                mux.emit(&format!("\n[!] Exec Error: {err}\n"));
            }
        }
    }

    mux.emit("\n=== SCAN COMPLETE ===\n");

    if let Some(hook) = post_run {
        hook(&spec.transcript_path, &mut mux);
    }

    // Dropping the guard queues the sentinel and returns to idle, in that
    // order: a second run must not be accepted before the consumer can
    // observe the end of this one.
    drop(completion);
}
