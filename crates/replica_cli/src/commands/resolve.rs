//! Resolve command implementation.

use replica_config::{SessionAuthority, SyncConfiguration, ValidationResult};
use serde::Serialize;
use std::sync::Arc;

/// Result of resolving a locator.
#[derive(Debug, Serialize)]
pub struct ResolveResult {
    /// Authority identity.
    pub identity: String,
    /// Locator as given.
    pub input: String,
    /// Locator after wildcard resolution.
    pub resolved: String,
    /// Whether the connection uses TLS.
    pub secure: bool,
    /// Server host.
    pub host: String,
    /// Explicit server port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Whether opens wait for the initial download.
    pub wait_for_server_changes: bool,
    /// Wait bound in seconds, if any.
    pub server_wait_timeout_secs: Option<f64>,
}

/// Builds a configuration for `identity` and reports the resolved locator.
pub fn resolve(identity: &str, locator: &str) -> ValidationResult<ResolveResult> {
    let config = SyncConfiguration::new(Arc::new(SessionAuthority::new(identity)), locator)?;
    let resolved = config.locator();

    Ok(ResolveResult {
        identity: identity.to_string(),
        input: locator.to_string(),
        resolved: resolved.to_string(),
        secure: resolved.is_secure(),
        host: resolved.host().to_string(),
        port: resolved.port(),
        wait_for_server_changes: config.wait_for_server_changes(),
        server_wait_timeout_secs: config.server_wait_timeout().map(|t| t.as_secs_f64()),
    })
}

/// Runs the resolve command.
pub fn run(identity: &str, locator: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = resolve(identity, locator)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Identity: {}", result.identity);
            println!("Input:    {}", result.input);
            println!("Resolved: {}", result.resolved);
            println!("Secure:   {}", result.secure);
            match result.port {
                Some(port) => println!("Server:   {}:{}", result.host, port),
                None => println!("Server:   {}", result.host),
            }
            println!("Wait:     {}", result.wait_for_server_changes);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_config::ValidationError;

    #[test]
    fn resolve_substitutes_identity() {
        let result = resolve("alice", "realms://example.org:9443/~/notes").unwrap();
        assert_eq!(result.resolved, "realms://example.org:9443/alice/notes");
        assert!(result.secure);
        assert_eq!(result.port, Some(9443));
    }

    #[test]
    fn resolve_reports_validation_errors() {
        let err = resolve("alice", "realm://example.org/~/notes.realm.lock").unwrap_err();
        assert!(matches!(err, ValidationError::ReservedSuffix { .. }));
    }

    #[test]
    fn resolve_result_serializes() {
        let result = resolve("alice", "realm://example.org/~/notes").unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"resolved\":\"realm://example.org/alice/notes\""));
        assert!(!json.contains("port"));
    }
}
