//! Application-wide constants for opscan.
//!
//! This module centralizes magic numbers so the tuning knobs of the
//! session executor live in one place. Constants are grouped by domain
//! with documentation explaining their purpose.
//!
//! # Categories
//!
//! - **PTY I/O**: read-loop pacing and chunk sizing
//! - **Streaming**: HTTP consumer timeouts
//! - **Files**: default on-disk artifact names

use std::time::Duration;

// ============================================================================
// PTY I/O
// ============================================================================

/// Bounded wait for the PTY master poll.
///
/// The read loop blocks at most this long per lap so it can interleave
/// child-exit checks with output reads. 100ms keeps output latency low
/// without spinning the CPU.
pub const PTY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum bytes read from the PTY master per read call.
pub const PTY_CHUNK_SIZE: usize = 1024;

/// Settle delay between observing child exit and draining trailing output.
///
/// Output written by the child just before exit may still be in flight
/// through the kernel PTY buffer when the exit status becomes visible.
pub const EXIT_DRAIN_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Streaming
// ============================================================================

/// Bounded wait for one pop from the output queue.
///
/// On expiry the streaming consumer re-checks whether the sequencer has
/// finished and the queue is drained, so a missed sentinel can never hang
/// the response forever.
pub const STREAM_POP_TIMEOUT: Duration = Duration::from_millis(500);

/// Poll interval for bounded waits in tests and shutdown paths.
pub const POLL_INTERVAL_SHORT: Duration = Duration::from_millis(50);

// ============================================================================
// Files
// ============================================================================

/// Default transcript path for a scan run.
pub const DEFAULT_REPORT_FILENAME: &str = "network_full_security_report.txt";

/// Default notary ledger path.
pub const DEFAULT_LEDGER_FILENAME: &str = "scan_ledger.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_is_shorter_than_stream_timeout() {
        // The runner must get several exit checks per consumer wait,
        // otherwise the idle fallback can fire while output is pending.
        assert!(PTY_POLL_INTERVAL < STREAM_POP_TIMEOUT);
    }

    #[test]
    fn test_chunk_size_is_reasonable() {
        assert!(PTY_CHUNK_SIZE >= 512);
        assert!(PTY_CHUNK_SIZE <= 64 * 1024);
    }
}
