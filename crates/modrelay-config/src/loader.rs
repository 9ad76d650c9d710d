// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./modrelay.toml` > `~/.config/modrelay/modrelay.toml`
//! > `/etc/modrelay/modrelay.toml` with environment variable overrides via
//! the `MODRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ModrelayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/modrelay/modrelay.toml` (system-wide)
/// 3. `~/.config/modrelay/modrelay.toml` (user XDG config)
/// 4. `./modrelay.toml` (local directory)
/// 5. `MODRELAY_*` environment variables
pub fn load_config() -> Result<ModrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ModrelayConfig::default()))
        .merge(Toml::file("/etc/modrelay/modrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("modrelay/modrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("modrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ModrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ModrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ModrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ModrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `MODRELAY_RELAY_IDLE_TIMEOUT_SECS` must
/// map to `relay.idle_timeout_secs`, not `relay.idle.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("MODRELAY_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: MODRELAY_RELAY_CHANNEL_ID -> "relay_channel_id"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("relay_", "relay.", 1);
        mapped.into()
    })
}
