//! Target policy: the allowlist gate in front of the assessment pipeline.
//!
//! Only loopback targets pass. The gate intentionally knows nothing about
//! scan semantics — it answers one boolean question about the target host.

use url::Url;

/// Hosts the pipeline is allowed to assess.
const ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Allow only localhost / 127.0.0.1 targets, blocking everything else.
///
/// The target must be a full URL (`http://localhost:3000`); anything that
/// does not parse to a host — including a bare hostname — is rejected.
pub fn is_target_allowed(target: &str) -> bool {
    if target.is_empty() {
        return false;
    }

    let Ok(parsed) = Url::parse(target) else {
        return false;
    };

    match parsed.host_str() {
        Some(host) => ALLOWED_HOSTS.contains(&host),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_urls_are_allowed() {
        assert!(is_target_allowed("http://localhost:3000"));
        assert!(is_target_allowed("http://localhost"));
        assert!(is_target_allowed("https://127.0.0.1:8443/path"));
    }

    #[test]
    fn test_remote_hosts_are_blocked() {
        assert!(!is_target_allowed("http://example.com"));
        assert!(!is_target_allowed("https://10.0.0.5"));
        assert!(!is_target_allowed("http://192.168.1.1:8080"));
    }

    #[test]
    fn test_non_urls_are_blocked() {
        assert!(!is_target_allowed(""));
        assert!(!is_target_allowed("localhost"));
        assert!(!is_target_allowed("not a url"));
    }
}
