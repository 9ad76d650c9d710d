// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the modrelay daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level modrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModrelayConfig {
    /// Daemon identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Ticket relay behavior settings.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Daemon identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the daemon.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "modrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Ticket relay behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Identifier of the shared relay channel tickets are posted into.
    /// `None` until an admin sets one; tickets created before then carry
    /// no channel and the transport decides where to post them.
    #[serde(default)]
    pub channel_id: Option<String>,

    /// Inactivity window after which an open ticket is eligible for
    /// closure.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Interval between sweeper ticks. Independent of the idle timeout.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How long closed ticket ids are retained to tell reopens apart from
    /// duplicates.
    #[serde(default = "default_closed_retention_secs")]
    pub closed_retention_secs: u64,

    /// Archive attempts for a closing ticket before it is force-closed.
    #[serde(default = "default_max_close_attempts")]
    pub max_close_attempts: u32,

    /// Upper bound on tickets processed per sweep tick.
    #[serde(default = "default_max_per_sweep")]
    pub max_per_sweep: usize,

    /// Bounded wait for a per-user session lock before the operation
    /// fails as retryable.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            closed_retention_secs: default_closed_retention_secs(),
            max_close_attempts: default_max_close_attempts(),
            max_per_sweep: default_max_per_sweep(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_closed_retention_secs() -> u64 {
    3600
}

fn default_max_close_attempts() -> u32 {
    5
}

fn default_max_per_sweep() -> usize {
    64
}

fn default_lock_wait_ms() -> u64 {
    5000
}
