//! Scripted assessment pipeline: policy gate, tool selection, execution.
//!
//! A deliberately simple, stateless flow next to the interactive session
//! executor: validate the target against policy, look up the tool set for
//! the requested test type, run each tool as a captured subprocess and
//! collect structured reports. No PTY, no streaming, no shared state.

pub mod executor;
pub mod registry;

pub use executor::ToolReport;
pub use registry::Tool;

use anyhow::{bail, Result};

use crate::policy;

/// Input for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    /// Target URL (must satisfy the policy allowlist).
    pub target: String,
    /// Test type name: `network_scan`, `web_scan`, or `full_scan`.
    pub test_type: String,
}

/// Run the full pipeline: policy check, tool selection, sequential
/// execution. Tool order follows the registry and is preserved in the
/// returned reports.
pub fn run_assessment(config: &AssessmentConfig) -> Result<Vec<ToolReport>> {
    log::info!("starting assessment pipeline for {}", config.target);

    if !policy::is_target_allowed(&config.target) {
        bail!("Target {} is not allowed by policy", config.target);
    }
    log::info!("target allowed by policy");

    let tools = registry::tools_for_test(&config.test_type)?;
    log::info!("tools selected: {tools:?}");

    let mut reports = Vec::with_capacity(tools.len());
    for tool in tools {
        log::info!("executing {}", tool.name());
        reports.push(executor::execute_tool(tool, &config.target)?);
    }

    log::info!("assessment completed");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disallowed_target_is_rejected_before_any_tool_runs() {
        let config = AssessmentConfig {
            target: "http://example.com".to_string(),
            test_type: "network_scan".to_string(),
        };
        let err = run_assessment(&config).expect_err("policy must reject");
        assert!(err.to_string().contains("not allowed by policy"));
    }

    #[test]
    fn test_unknown_test_type_is_rejected() {
        let config = AssessmentConfig {
            target: "http://localhost:3000".to_string(),
            test_type: "quantum_scan".to_string(),
        };
        let err = run_assessment(&config).expect_err("registry must reject");
        assert!(err.to_string().contains("Unsupported test type"));
    }
}
