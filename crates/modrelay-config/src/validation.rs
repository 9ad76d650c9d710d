// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero durations and a non-empty channel id.

use crate::diagnostic::ConfigError;
use crate::model::ModrelayConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &ModrelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.agent.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "agent.name must not be empty".to_string(),
        });
    }

    if let Some(channel) = &config.relay.channel_id
        && channel.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "relay.channel_id must not be empty when set".to_string(),
        });
    }

    if config.relay.idle_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.idle_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.relay.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.relay.max_close_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.max_close_attempts must be at least 1".to_string(),
        });
    }

    if config.relay.max_per_sweep == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.max_per_sweep must be at least 1".to_string(),
        });
    }

    if config.relay.lock_wait_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.lock_wait_ms must be at least 1".to_string(),
        });
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
    fn default_config_validates() {
        let config = ModrelayConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_idle_timeout_fails_validation() {
        let mut config = ModrelayConfig::default();
        config.relay.idle_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("idle_timeout_secs"))));
    }

    #[test]
    fn empty_channel_id_fails_validation() {
        let mut config = ModrelayConfig::default();
        config.relay.channel_id = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("channel_id"))));
    }

    #[test]
    fn unset_channel_id_is_fine() {
        let config = ModrelayConfig::default();
        assert!(config.relay.channel_id.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn multiple_violations_all_collected() {
        let mut config = ModrelayConfig::default();
        config.relay.idle_timeout_secs = 0;
        config.relay.sweep_interval_secs = 0;
        config.relay.max_close_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
