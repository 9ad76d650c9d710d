// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-reloadable routing settings.
//!
//! Admin reconfiguration (`set_channel`, `set_timeout`) takes effect for
//! subsequent operations only; readers grab a consistent snapshot via
//! [`SettingsHandle::current`] and never observe a half-applied update.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use modrelay_core::ChannelId;
use modrelay_config::model::RelayConfig;

/// A snapshot of the routing configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Relay channel newly created tickets are posted into.
    pub channel: Option<ChannelId>,
    /// Inactivity window after which an open ticket is swept.
    pub idle_timeout: Duration,
    /// Interval between sweeper ticks.
    pub sweep_interval: Duration,
    /// Retention window for closed ticket ids.
    pub closed_retention: Duration,
    /// Archive attempts before a closing ticket is force-closed.
    pub max_close_attempts: u32,
    /// Upper bound on tickets processed per sweep tick.
    pub max_per_sweep: usize,
    /// Bounded wait for a per-user session lock.
    pub lock_wait: Duration,
}

impl RelaySettings {
    /// Build settings from the deserialized `[relay]` config section.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            channel: config.channel_id.clone().map(ChannelId),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            closed_retention: Duration::from_secs(config.closed_retention_secs),
            max_close_attempts: config.max_close_attempts,
            max_per_sweep: config.max_per_sweep,
            lock_wait: Duration::from_millis(config.lock_wait_ms),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Shared handle to the current settings, swappable at runtime.
#[derive(Debug)]
pub struct SettingsHandle {
    inner: ArcSwap<RelaySettings>,
}

impl SettingsHandle {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            inner: ArcSwap::from_pointee(settings),
        }
    }

    /// Current settings snapshot. In-flight operations that already took a
    /// snapshot keep using it.
    pub fn current(&self) -> Arc<RelaySettings> {
        self.inner.load_full()
    }

    /// Point subsequently created tickets at a new relay channel.
    pub fn set_channel(&self, channel: ChannelId) {
        self.inner.rcu(|current| {
            let mut next = RelaySettings::clone(current);
            next.channel = Some(channel.clone());
            next
        });
    }

    /// Change the idle timeout used by subsequent sweeps.
    pub fn set_idle_timeout(&self, idle_timeout: Duration) {
        self.inner.rcu(|current| {
            let mut next = RelaySettings::clone(current);
            next.idle_timeout = idle_timeout;
            next
        });
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(RelaySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_config_defaults() {
        let settings = RelaySettings::default();
        assert!(settings.channel.is_none());
        assert_eq!(settings.idle_timeout, Duration::from_secs(600));
        assert_eq!(settings.sweep_interval, Duration::from_secs(30));
        assert_eq!(settings.max_close_attempts, 5);
    }

    #[test]
    fn set_channel_is_visible_to_next_snapshot() {
        let handle = SettingsHandle::default();
        let before = handle.current();
        handle.set_channel(ChannelId("mod-inbox".into()));

        // The old snapshot is unchanged; the new one sees the update.
        assert!(before.channel.is_none());
        assert_eq!(
            handle.current().channel,
            Some(ChannelId("mod-inbox".into()))
        );
    }

    #[test]
    fn set_idle_timeout_preserves_other_fields() {
        let handle = SettingsHandle::default();
        handle.set_channel(ChannelId("mod-inbox".into()));
        handle.set_idle_timeout(Duration::from_secs(60));

        let current = handle.current();
        assert_eq!(current.idle_timeout, Duration::from_secs(60));
        assert_eq!(current.channel, Some(ChannelId("mod-inbox".into())));
    }
}
