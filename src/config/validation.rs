//! Configuration validation logic.

use std::collections::HashSet;

use crate::config::schema::ProxyConfig;
use crate::net::allowlist::DebugNetworks;

/// One semantic problem found in a config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

/// Validate a ProxyConfig for semantic correctness. All problems are
/// reported, not just the first.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names: HashSet<&str> = HashSet::new();
    for endpoint in &config.endpoints {
        if endpoint.name.is_empty() {
            errors.push(ValidationError("endpoint name must not be empty".to_string()));
        } else if !names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate endpoint name {:?}",
                endpoint.name
            )));
        }

        // Patterns are <domain>/<path>; a root without a slash can never
        // be registered.
        if !endpoint.root.contains('/') {
            errors.push(ValidationError(format!(
                "endpoint {:?} root {:?} is not in <domain>/<path> form",
                endpoint.name, endpoint.root
            )));
        }
    }

    if let Err(err) = DebugNetworks::parse(&config.debug.networks) {
        errors.push(ValidationError(err.to_string()));
    }

    if config.control.ping_delay_secs == 0 {
        errors.push(ValidationError(
            "control.ping_delay_secs must be > 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
