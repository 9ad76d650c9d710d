// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the modrelay daemon.
//!
//! Layered loading (defaults > system > XDG > local > env) via Figment,
//! strict unknown-key rejection with "did you mean?" suggestions, and
//! post-deserialization validation.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ModrelayConfig;
pub use validation::validate_config;

/// Load configuration from the standard hierarchy and validate it.
///
/// Returns the validated config, or every collected error (deserialization
/// and validation alike) as renderable diagnostics.
pub fn load_and_validate() -> Result<ModrelayConfig, Vec<ConfigError>> {
    let config = loader::load_config().map_err(diagnostic::figment_to_config_errors)?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string and validate it.
///
/// Test-facing twin of [`load_and_validate`].
pub fn load_and_validate_str(toml_content: &str) -> Result<ModrelayConfig, Vec<ConfigError>> {
    let config =
        loader::load_config_from_str(toml_content).map_err(diagnostic::figment_to_config_errors)?;
    validation::validate_config(&config)?;
    Ok(config)
}
