//! Scan catalog: flat boolean options mapped to an ordered command list.
//!
//! Pure construction, no execution. Order is semantically significant —
//! discovery before enumeration before exploitation-adjacent checks — and
//! is preserved end to end through the sequencer and the transcript.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scan option flags as they appear in the `/run` request body.
///
/// Every flag defaults to off; the field names are the wire names.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// ARP ping sweep of the target network.
    pub host_discovery: bool,
    /// Default-port TCP scan.
    pub basic_tcp: bool,
    /// All-port TCP scan.
    pub full_tcp: bool,
    /// Top-100 UDP port scan (requires privileges).
    pub udp_scan: bool,
    /// Service/version fingerprinting.
    pub service_detect: bool,
    /// Aggressive scan bundle (requires privileges).
    pub aggressive: bool,
    /// OS fingerprinting (requires privileges).
    pub os_detect: bool,
    /// Vulnerability script scan.
    pub vuln_scan: bool,
    /// Auth/default-credential/discovery scripts.
    pub auth_checks: bool,
    /// ACK scan for firewall rule mapping.
    pub firewall: bool,
    /// TLS certificate and cipher enumeration.
    pub ssl_scan: bool,
    /// Nikto web server scan (skipped with a note when not installed).
    pub nikto: bool,
    /// HTTP enumeration scripts.
    pub web_enum: bool,
    /// DoS-category script checks.
    pub dos_check: bool,
    /// Local privilege-escalation surface (setuid files, crontabs).
    pub priv_esc: bool,
    /// Local account password policy.
    pub password_policy: bool,
    /// Locally listening TCP services.
    pub listening_services: bool,
    /// Docker containers and networks (skipped when docker is absent).
    pub container: bool,
    /// Launch daemons / persistence locations.
    pub persistence: bool,
    /// Routing table and interface dump.
    pub network_stack: bool,
}

/// The ordered command list for one run, plus notes about requested
/// tools that had to be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Shell commands in execution order.
    pub commands: Vec<String>,
    /// Diagnostic lines for the stream (e.g. a missing tool).
    pub notes: Vec<String>,
}

/// A target value that cannot be safely placed in a shell command.
#[derive(Debug)]
pub struct InvalidTarget(String);

impl fmt::Display for InvalidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target cannot be shell-quoted: {}", self.0)
    }
}

impl std::error::Error for InvalidTarget {}

/// Build the command list from the request options, probing the real
/// environment for optional tools.
pub fn build_plan(
    target_ip: &str,
    target_network: &str,
    options: &ScanOptions,
) -> Result<ScanPlan, InvalidTarget> {
    build_plan_with(target_ip, target_network, options, |tool| {
        which::which(tool).is_ok()
    })
}

/// Build the command list with an injectable tool-availability probe.
///
/// Split out so tests can exercise the gating without caring what is
/// installed on the build machine.
pub fn build_plan_with(
    target_ip: &str,
    target_network: &str,
    options: &ScanOptions,
    tool_available: impl Fn(&str) -> bool,
) -> Result<ScanPlan, InvalidTarget> {
    let ip = quote(target_ip)?;
    let net = quote(target_network)?;

    let mut commands = Vec::new();
    let mut notes = Vec::new();

    if options.host_discovery {
        commands.push(format!("nmap -sn -PR {net}"));
    }
    if options.basic_tcp {
        commands.push(format!("nmap -T4 {ip}"));
    }
    if options.full_tcp {
        commands.push(format!("nmap -p- -T4 {ip}"));
    }
    if options.udp_scan {
        commands.push(format!("sudo nmap -sU --top-ports 100 {ip}"));
    }
    if options.service_detect {
        commands.push(format!("nmap -sV --version-intensity 9 {ip}"));
    }
    if options.aggressive {
        commands.push(format!("sudo nmap -A {ip}"));
    }
    if options.os_detect {
        commands.push(format!("sudo nmap -O {ip}"));
    }
    if options.vuln_scan {
        commands.push(format!("nmap --script vuln {ip}"));
    }
    if options.auth_checks {
        commands.push(format!("nmap --script auth,default,discovery {ip}"));
    }
    if options.firewall {
        commands.push(format!("nmap -sA -T4 {ip}"));
    }
    if options.ssl_scan {
        commands.push(format!(
            "nmap --script ssl-cert,ssl-enum-ciphers -p 443,8443 {ip}"
        ));
    }

    if options.nikto {
        if tool_available("nikto") {
            commands.push(format!("nikto -h http://{ip} -maxtime 10m"));
        } else {
            notes.push("\n[!] Nikto missing\n".to_string());
        }
    }

    if options.web_enum {
        commands.push(format!(
            "nmap --script http-enum,http-methods,http-headers -p 80,443 {ip}"
        ));
    }
    if options.dos_check {
        commands.push(format!("nmap --script dos -p 80,443,3306 {ip}"));
    }

    if options.priv_esc {
        commands.push("sudo find / -perm -4000 -type f 2>/dev/null".to_string());
        commands.push("sudo crontab -l 2>/dev/null".to_string());
    }

    if options.password_policy {
        commands.push(
            "pwpolicy getaccountpolicies 2>/dev/null || echo 'Policy not accessible'".to_string(),
        );
        commands.push("dscl . -list /Users | grep -v \"_\"".to_string());
    }

    if options.listening_services {
        commands.push("sudo lsof -iTCP -sTCP:LISTEN".to_string());
    }

    if options.container {
        if tool_available("docker") {
            commands.push("docker ps -a".to_string());
            commands.push("docker network ls".to_string());
        } else {
            notes.push("\n[!] Docker missing\n".to_string());
        }
    }

    if options.persistence {
        commands.push("launchctl list | head -50".to_string());
        commands.push("ls /Library/LaunchDaemons 2>/dev/null".to_string());
    }

    if options.network_stack {
        commands.push("netstat -rn".to_string());
        commands.push("ifconfig".to_string());
    }

    Ok(ScanPlan { commands, notes })
}

fn quote(value: &str) -> Result<String, InvalidTarget> {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| InvalidTarget(value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything_installed(_tool: &str) -> bool {
        true
    }

    fn nothing_installed(_tool: &str) -> bool {
        false
    }

    #[test]
    fn test_no_options_yield_empty_plan() {
        let plan =
            build_plan_with("10.0.0.1", "10.0.0.0/24", &ScanOptions::default(), everything_installed)
                .expect("plan");
        assert!(plan.commands.is_empty());
        assert!(plan.notes.is_empty());
    }

    #[test]
    fn test_discovery_precedes_enumeration() {
        let options = ScanOptions {
            vuln_scan: true,
            host_discovery: true,
            basic_tcp: true,
            ..ScanOptions::default()
        };
        let plan = build_plan_with("10.0.0.1", "10.0.0.0/24", &options, everything_installed)
            .expect("plan");
        assert_eq!(
            plan.commands,
            vec![
                "nmap -sn -PR 10.0.0.0/24",
                "nmap -T4 10.0.0.1",
                "nmap --script vuln 10.0.0.1",
            ]
        );
    }

    #[test]
    fn test_multi_command_options_expand_in_order() {
        let options = ScanOptions {
            priv_esc: true,
            network_stack: true,
            ..ScanOptions::default()
        };
        let plan = build_plan_with("10.0.0.1", "10.0.0.0/24", &options, everything_installed)
            .expect("plan");
        assert_eq!(
            plan.commands,
            vec![
                "sudo find / -perm -4000 -type f 2>/dev/null",
                "sudo crontab -l 2>/dev/null",
                "netstat -rn",
                "ifconfig",
            ]
        );
    }

    #[test]
    fn test_missing_nikto_becomes_note_not_command() {
        let options = ScanOptions {
            nikto: true,
            ..ScanOptions::default()
        };
        let plan = build_plan_with("10.0.0.1", "10.0.0.0/24", &options, nothing_installed)
            .expect("plan");
        assert!(plan.commands.is_empty());
        assert_eq!(plan.notes, vec!["\n[!] Nikto missing\n"]);
    }

    #[test]
    fn test_docker_gating() {
        let options = ScanOptions {
            container: true,
            ..ScanOptions::default()
        };
        let with = build_plan_with("10.0.0.1", "10.0.0.0/24", &options, everything_installed)
            .expect("plan");
        assert_eq!(with.commands, vec!["docker ps -a", "docker network ls"]);

        let without = build_plan_with("10.0.0.1", "10.0.0.0/24", &options, nothing_installed)
            .expect("plan");
        assert!(without.commands.is_empty());
        assert_eq!(without.notes.len(), 1);
    }

    #[test]
    fn test_hostile_target_is_quoted() {
        let options = ScanOptions {
            basic_tcp: true,
            ..ScanOptions::default()
        };
        let plan = build_plan_with("10.0.0.1; rm -rf /", "net", &options, everything_installed)
            .expect("plan");
        assert_eq!(plan.commands, vec!["nmap -T4 '10.0.0.1; rm -rf /'"]);
    }

    #[test]
    fn test_nul_byte_target_is_rejected() {
        let options = ScanOptions {
            basic_tcp: true,
            ..ScanOptions::default()
        };
        assert!(
            build_plan_with("10.0.0.1\0", "net", &options, everything_installed).is_err()
        );
    }

    #[test]
    fn test_options_deserialize_with_partial_body() {
        let options: ScanOptions =
            serde_json::from_str(r#"{"basic_tcp": true, "nikto": true}"#).expect("parse");
        assert!(options.basic_tcp);
        assert!(options.nikto);
        assert!(!options.full_tcp);
    }
}
