//! Transcript notarization: a local sha-256 ledger.
//!
//! After a run, the transcript's digest is recorded under an opaque scan
//! identifier; `/verify` later recomputes the digest and compares. The
//! ledger is a plain JSON file — the verification contract is only "a
//! boolean derived from a hash ledger", not any particular backing store.
//!
//! Notarization failures never invalidate a run: the hook reports into
//! the live stream and logs, and the transcript stands either way.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One recorded transcript digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Hex-encoded sha-256 of the transcript at recording time.
    pub report_hash: String,
    /// When the digest was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Append-style hash ledger keyed by scan identifier.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Bind a ledger to its backing file. The file is created lazily on
    /// the first `record`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Record the digest of `report` under `scan_id`, overwriting any
    /// previous entry for the same id.
    pub fn record(&self, report: &Path, scan_id: &str) -> Result<LedgerEntry> {
        let entry = LedgerEntry {
            report_hash: file_digest(report)?,
            recorded_at: Utc::now(),
        };
        let mut entries = self.load()?;
        entries.insert(scan_id.to_owned(), entry.clone());
        self.store(&entries)?;
        Ok(entry)
    }

    /// True iff `report`'s current digest matches the entry for `scan_id`.
    pub fn verify_file(&self, report: &Path, scan_id: &str) -> Result<bool> {
        let digest = file_digest(report)?;
        self.matches(scan_id, &digest)
    }

    /// True iff `text`'s digest matches the entry for `scan_id`.
    pub fn verify_text(&self, text: &str, scan_id: &str) -> Result<bool> {
        self.matches(scan_id, &text_digest(text))
    }

    fn matches(&self, scan_id: &str, digest: &str) -> Result<bool> {
        let entries = self.load()?;
        Ok(entries
            .get(scan_id)
            .is_some_and(|entry| entry.report_hash == digest))
    }

    fn load(&self) -> Result<BTreeMap<String, LedgerEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read ledger at {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("ledger at {} is not valid JSON", self.path.display()))
    }

    fn store(&self, entries: &BTreeMap<String, LedgerEntry>) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("failed to write ledger at {}", self.path.display()))
    }
}

/// Hex sha-256 of a file, streamed in 8 KiB blocks.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open report at {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(HEXLOWER.encode(&hasher.finalize()))
}

/// Hex sha-256 of in-memory text.
pub fn text_digest(text: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(text.as_bytes()))
}
