//! Request and response bodies for the HTTP API.
//!
//! Field names are the wire contract; defaults mirror what the endpoints
//! tolerate being absent (targets, options, consent — all optional, all
//! failing safe).

use serde::{Deserialize, Serialize};

use crate::scan::ScanOptions;

fn default_target_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_target_network() -> String {
    "192.168.1.0/24".to_string()
}

/// Consent block of a `/run` request. Absent consent is denied consent.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Consent {
    /// The caller's explicit confirmation to run the scan.
    pub user_confirmation: bool,
}

/// Body of `POST /run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Single-host target for host-scoped scans.
    #[serde(default = "default_target_ip")]
    pub target_ip: String,
    /// CIDR target for network-scoped scans.
    #[serde(default = "default_target_network")]
    pub target_network: String,
    /// Scan selection flags.
    #[serde(default)]
    pub options: ScanOptions,
    /// Consent block; must carry `user_confirmation: true`.
    #[serde(default)]
    pub consent: Consent,
}

/// Body of `POST /input`.
#[derive(Debug, Deserialize)]
pub struct InputRequest {
    /// Text delivered to the running command's terminal.
    #[serde(default)]
    pub input: String,
}

/// Body of `POST /verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// The scan identifier the digest was recorded under.
    pub scan_id: String,
    /// Inline transcript text to verify; when absent the local report
    /// file is verified instead.
    #[serde(default)]
    pub report: Option<String>,
}

/// Body of `POST /verify` responses.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Whether the digest matched the ledger entry.
    pub valid: bool,
    /// Echo of the requested scan identifier.
    pub scan_id: String,
}

/// Body of `POST /summarize`.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    /// Report text to summarize; when absent the local report file is
    /// used as a fallback.
    #[serde(default)]
    pub report: Option<String>,
}

/// Body of `POST /summarize` responses.
#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    /// The model's summary text.
    pub summary: String,
}

/// Generic status acknowledgment.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Short machine-readable status.
    pub status: &'static str,
}

/// Generic error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description of the failure.
    pub error: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Liveness marker.
    pub status: &'static str,
    /// Current session state name.
    pub session: &'static str,
}
