//! Opscan - interactive network assessment daemon.
//!
//! This crate provides the core functionality for the opscan CLI:
//! running an ordered list of scan commands on a pseudo-terminal,
//! streaming raw output to an HTTP client in real time, accepting
//! keystroke-level input from a concurrent request, and persisting an
//! append-only transcript per run.
//!
//! # Architecture
//!
//! The crate follows a single-session executor pattern:
//!
//! - **Session** - process-wide run state machine and live PTY handles
//! - **Sequencer** - background thread iterating the command list
//! - **PTY runner** - spawns each command on a fresh pseudo-terminal and
//!   pumps its output until exit
//! - **Server** - axum HTTP adapter: start/stream, input injection,
//!   stop, verification, summarization
//!
//! # Modules
//!
//! - [`session`] - session state, sequencer, PTY runner, output fan-out
//! - [`scan`] - option flags to ordered command list (pure mapping)
//! - [`server`] - HTTP routes and streaming consumer
//! - [`notary`] - transcript hash ledger
//! - [`pipeline`] - scripted policy/registry/subprocess assessment flow
//! - [`config`] - configuration loading/saving

// Library modules
pub mod config;
pub mod constants;
pub mod notary;
pub mod pipeline;
pub mod policy;
pub mod scan;
pub mod server;
pub mod session;
pub mod summarize;

// Re-export commonly used types
pub use config::Config;
pub use notary::Ledger;
pub use scan::{ScanOptions, ScanPlan};
pub use session::{RunSpec, Session, SessionState, StreamEvent};
