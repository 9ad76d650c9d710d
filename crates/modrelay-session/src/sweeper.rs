// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background reclamation of idle tickets.
//!
//! The sweeper ticks on a fixed interval (independent of the idle timeout)
//! and emits [`TicketExpired`] events consumed by the router. It never
//! holds a user lock across a full scan: each closing decision takes that
//! user's lock individually and re-checks idleness under it, so a message
//! racing the sweep wins.
//!
//! Sweeping is best-effort and idempotent. Tickets stuck in `Closing`
//! (archive never confirmed) are re-emitted each tick until the attempt
//! budget runs out, then force-closed so a broken transport cannot pin
//! resources forever.

use std::sync::Arc;

use chrono::TimeDelta;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modrelay_core::{Clock, TicketExpired, TicketState};

use crate::lock::UserLockManager;
use crate::settings::SettingsHandle;
use crate::store::TicketStore;

/// Outcome counters for one sweep pass, mostly for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Open tickets transitioned to `Closing` this pass.
    pub expired: usize,
    /// Closing tickets re-emitted for another archive attempt.
    pub retried: usize,
    /// Closing tickets force-closed after exhausting the attempt budget.
    pub force_closed: usize,
    /// Tickets skipped because the user's lock was busy.
    pub skipped: usize,
    /// Closed tickets dropped from retention.
    pub pruned: usize,
}

/// Periodic scanner that expires idle tickets.
pub struct ExpirySweeper {
    store: Arc<TicketStore>,
    locks: Arc<UserLockManager>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsHandle>,
    events: mpsc::Sender<TicketExpired>,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<TicketStore>,
        locks: Arc<UserLockManager>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsHandle>,
        events: mpsc::Sender<TicketExpired>,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            settings,
            events,
        }
    }

    /// Tick loop. Runs until the cancellation token fires; each tick
    /// delegates to [`sweep_once`](Self::sweep_once).
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.settings.current().sweep_interval;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it so a freshly
        // started daemon does not sweep before any traffic exists.
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "expiry sweeper running");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report != SweepReport::default() {
                        debug!(
                            expired = report.expired,
                            retried = report.retried,
                            force_closed = report.force_closed,
                            skipped = report.skipped,
                            pruned = report.pruned,
                            "sweep pass complete"
                        );
                    }
                }
                _ = cancel.cancelled() => {
                    info!("expiry sweeper stopped");
                    break;
                }
            }
        }
    }

    /// One sweep pass. Exposed so tests drive sweeps deterministically
    /// against a manual clock instead of sleeping through intervals.
    pub async fn sweep_once(&self) -> SweepReport {
        let settings = self.settings.current();
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let Ok(idle_window) = TimeDelta::from_std(settings.idle_timeout) else {
            warn!("idle timeout out of range, skipping sweep");
            return report;
        };
        let threshold = now - idle_window;

        let mut just_expired = Vec::new();
        for ticket in self
            .store
            .list_idle(threshold)
            .into_iter()
            .take(settings.max_per_sweep)
        {
            let store = Arc::clone(&self.store);
            let ticket_id = ticket.id.clone();
            let outcome = self
                .locks
                .try_with_user_lock(&ticket.user_id, || async move {
                    // Re-check under the lock: activity may have raced the
                    // scan.
                    let Some(current) = store.ticket(&ticket_id) else {
                        return Ok(false);
                    };
                    if current.state != TicketState::Open || current.last_activity_at >= threshold
                    {
                        return Ok(false);
                    }
                    store.mark_closing(&ticket_id)?;
                    Ok(true)
                })
                .await;

            match outcome {
                None => {
                    // User is mid-operation; their ticket is not idle.
                    report.skipped += 1;
                }
                Some(Ok(false)) => {}
                Some(Ok(true)) => {
                    report.expired += 1;
                    just_expired.push(ticket.id.clone());
                    if self.emit(&ticket.id, &ticket.user_id).await.is_err() {
                        return report;
                    }
                }
                Some(Err(e)) => {
                    warn!(ticket = %ticket.id, error = %e, "failed to expire ticket");
                }
            }
        }

        // Closing tickets whose archive was never confirmed: retry until
        // the budget runs out, then force-close. Tickets expired this very
        // pass already have their event in flight.
        for ticket in self.store.list_closing() {
            if just_expired.contains(&ticket.id) {
                continue;
            }
            if ticket.close_attempts >= settings.max_close_attempts {
                let store = Arc::clone(&self.store);
                let ticket_id = ticket.id.clone();
                let closed = self
                    .locks
                    .try_with_user_lock(&ticket.user_id, || async move {
                        // A touch in the meantime revives the ticket and
                        // makes the force-close a no-op.
                        if store.ticket(&ticket_id).map(|t| t.state) == Some(TicketState::Closing)
                        {
                            store.mark_closed(&ticket_id)?;
                            return Ok(true);
                        }
                        Ok(false)
                    })
                    .await;

                match closed {
                    Some(Ok(true)) => {
                        warn!(
                            ticket = %ticket.id,
                            attempts = ticket.close_attempts,
                            "archive retry budget exhausted, force-closing"
                        );
                        report.force_closed += 1;
                    }
                    Some(Ok(false)) | None => {}
                    Some(Err(e)) => {
                        warn!(ticket = %ticket.id, error = %e, "force-close failed");
                    }
                }
            } else {
                report.retried += 1;
                if self.emit(&ticket.id, &ticket.user_id).await.is_err() {
                    return report;
                }
            }
        }

        if let Ok(retention) = TimeDelta::from_std(settings.closed_retention) {
            report.pruned = self.store.prune_closed(now - retention);
        }

        report
    }

    async fn emit(
        &self,
        ticket_id: &modrelay_core::TicketId,
        user_id: &modrelay_core::UserId,
    ) -> Result<(), ()> {
        let event = TicketExpired {
            ticket_id: ticket_id.clone(),
            user_id: user_id.clone(),
        };
        if self.events.send(event).await.is_err() {
            warn!("expiry event channel closed, abandoning sweep");
            return Err(());
        }
        Ok(())
    }
}
