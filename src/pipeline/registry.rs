//! Tool registry: test type to tool list.
//!
//! Users pick a test type, never individual tools; the mapping is fixed
//! here so the pipeline's surface stays a single string.

use anyhow::{bail, Result};

/// An assessment tool the pipeline knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Port/service scanner.
    Nmap,
    /// Web server scanner.
    Nikto,
}

impl Tool {
    /// The tool's binary / report name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nmap => "nmap",
            Self::Nikto => "nikto",
        }
    }
}

/// Decide tools based on test type (case-insensitive).
pub fn tools_for_test(test_type: &str) -> Result<Vec<Tool>> {
    match test_type.to_lowercase().as_str() {
        "network_scan" => Ok(vec![Tool::Nmap]),
        "web_scan" => Ok(vec![Tool::Nikto]),
        "full_scan" => Ok(vec![Tool::Nmap, Tool::Nikto]),
        other => bail!("Unsupported test type: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_test_types_map_to_tools() {
        assert_eq!(tools_for_test("network_scan").expect("ok"), vec![Tool::Nmap]);
        assert_eq!(tools_for_test("web_scan").expect("ok"), vec![Tool::Nikto]);
        assert_eq!(
            tools_for_test("full_scan").expect("ok"),
            vec![Tool::Nmap, Tool::Nikto]
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(tools_for_test("NETWORK_SCAN").expect("ok"), vec![Tool::Nmap]);
        assert_eq!(tools_for_test("Full_Scan").expect("ok").len(), 2);
    }

    #[test]
    fn test_unknown_test_type_fails() {
        assert!(tools_for_test("port_knock").is_err());
        assert!(tools_for_test("").is_err());
    }
}
