//! Report summarization through a local text-generation process.
//!
//! The transcript is piped into `ollama run <model>` on stdin and the
//! model's stdout comes back as the summary. No API, no network — the
//! daemon only fronts whatever ollama is installed locally.

use std::fmt;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Why a summary could not be produced.
#[derive(Debug)]
pub enum SummarizeError {
    /// `ollama` is not installed or not on PATH.
    OllamaMissing,
    /// The subprocess could not be driven.
    Io(std::io::Error),
    /// ollama ran but exited nonzero.
    Failed(String),
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OllamaMissing => write!(
                f,
                "Ollama is not installed or not in PATH. Please install Ollama to use this feature."
            ),
            Self::Io(err) => write!(f, "failed to run ollama: {err}"),
            Self::Failed(stderr) => write!(f, "Ollama execution failed: {stderr}"),
        }
    }
}

impl std::error::Error for SummarizeError {}

/// The instruction prepended to the report text.
fn build_prompt(report: &str) -> String {
    format!(
        "Summarize the given Network Penetration testing report. \
         Highlight critical vulnerabilities, open ports, and suggest \
         remediation steps:\n\n{report}"
    )
}

/// Summarize `report` with the given model.
pub async fn summarize_report(report: &str, model: &str) -> Result<String, SummarizeError> {
    if which::which("ollama").is_err() {
        return Err(SummarizeError::OllamaMissing);
    }

    let mut child = Command::new("ollama")
        .arg("run")
        .arg(model)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(SummarizeError::Io)?;

    let prompt = build_prompt(report);
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(SummarizeError::Io)?;
        // Dropping stdin closes it so the model sees end of input.
    }

    let output = child.wait_with_output().await.map_err(SummarizeError::Io)?;
    if !output.status.success() {
        return Err(SummarizeError::Failed(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
