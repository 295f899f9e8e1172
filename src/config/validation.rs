//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffers > 0, close codes in range)
//! - Validate addresses and path prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Close codes that only describe a closure locally and never go on the wire.
const RESERVED_CLOSE_CODES: [u16; 4] = [1004, 1005, 1006, 1015];

/// Check a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.websocket.max_message_size == 0 {
        errors.push(ValidationError::new("websocket.max_message_size", "must be greater than 0"));
    }
    if config.websocket.outbound_buffer == 0 {
        errors.push(ValidationError::new("websocket.outbound_buffer", "must be greater than 0"));
    }
    // 1000-2999 are protocol codes, 3000-4999 are application codes.
    let code = config.websocket.unrouted_close_code;
    if !(1000..=4999).contains(&code) {
        errors.push(ValidationError::new(
            "websocket.unrouted_close_code",
            format!("{code} is outside 1000-4999"),
        ));
    } else if RESERVED_CLOSE_CODES.contains(&code) {
        errors.push(ValidationError::new(
            "websocket.unrouted_close_code",
            format!("{code} is reserved and cannot be sent in a close frame"),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.credential.enabled && !config.credential.mount_prefix.starts_with('/') {
        errors.push(ValidationError::new("credential.mount_prefix", "must start with '/'"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nope".into();
        config.websocket.outbound_buffer = 0;
        config.websocket.unrouted_close_code = 999;
        config.credential.mount_prefix = "credential".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "websocket.outbound_buffer",
                "websocket.unrouted_close_code",
                "credential.mount_prefix",
            ]
        );
    }

    #[test]
    fn test_reserved_close_codes_rejected() {
        for code in [1004, 1005, 1006, 1015] {
            let mut config = ServerConfig::default();
            config.websocket.unrouted_close_code = code;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "websocket.unrouted_close_code");
            assert!(errors[0].message.contains("reserved"));
        }

        let mut config = ServerConfig::default();
        config.websocket.unrouted_close_code = 4404;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
