// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advanceable clock for deterministic expiry tests.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use modrelay_core::Clock;

/// A clock that only moves when the test says so.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start the clock at a fixed instant.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Advance virtual time by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += TimeDelta::from_std(delta).expect("delta out of range");
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        "2026-03-01T00:00:00Z".parse().expect("valid timestamp")
    }

    #[test]
    fn advance_moves_time_forward() {
        let clock = ManualClock::starting_at(epoch());
        assert_eq!(clock.now(), epoch());

        clock.advance(Duration::from_secs(601));
        assert_eq!(clock.now(), epoch() + TimeDelta::seconds(601));
    }

    #[test]
    fn set_jumps_to_instant() {
        let clock = ManualClock::starting_at(epoch());
        let later = epoch() + TimeDelta::days(1);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
