//! Tool execution: one captured subprocess per tool.

use std::process::Command;

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;

use super::registry::Tool;

/// Structured result of one tool run.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    /// Tool name.
    pub tool: &'static str,
    /// The target exactly as requested.
    pub target: String,
    /// Host extracted from the target URL.
    pub resolved_host: String,
    /// Port extracted from the target URL, if any.
    pub port: Option<u16>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code, when the tool terminated normally.
    pub exit_code: Option<i32>,
}

/// Extract host and port from a target that may be a URL or a bare host.
fn parse_target(target: &str) -> (String, Option<u16>) {
    match Url::parse(target) {
        Ok(url) => {
            let host = url
                .host_str()
                .map_or_else(|| target.to_owned(), str::to_owned);
            (host, url.port())
        }
        Err(_) => (target.to_owned(), None),
    }
}

/// Execute a single tool against `target`, capturing its output.
///
/// An `Err` means the tool could not be invoked at all; a tool that runs
/// and reports problems does so inside the returned report.
pub fn execute_tool(tool: Tool, target: &str) -> Result<ToolReport> {
    let (host, port) = parse_target(target);

    let mut command = match tool {
        Tool::Nmap => {
            let mut cmd = Command::new("nmap");
            cmd.args(["-sT", "-sV", "--open"]);
            if let Some(port) = port {
                cmd.args(["-p", &port.to_string()]);
            }
            cmd.arg(&host);
            cmd
        }
        Tool::Nikto => {
            let mut cmd = Command::new("nikto");
            cmd.args(["-h", target, "-maxtime", "10m"]);
            cmd
        }
    };

    let output = command
        .output()
        .with_context(|| format!("failed to invoke {}", tool.name()))?;

    Ok(ToolReport {
        tool: tool.name(),
        target: target.to_owned(),
        resolved_host: host,
        port,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    })
}
