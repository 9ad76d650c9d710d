// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the expiry sweeper, driven by a manual clock.
//!
//! Tests call `sweep_once` directly instead of sleeping through intervals,
//! so every expiry decision is deterministic.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use modrelay_core::{Clock, TicketExpired, TicketState, UserId};
use modrelay_session::{
    ExpirySweeper, RelaySettings, SettingsHandle, TicketRouter, TicketStore, UserLockManager,
};
use modrelay_test_utils::ManualClock;

fn epoch() -> DateTime<Utc> {
    "2026-03-01T00:00:00Z".parse().expect("valid timestamp")
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

struct Harness {
    store: Arc<TicketStore>,
    clock: Arc<ManualClock>,
    settings: Arc<SettingsHandle>,
    router: Arc<TicketRouter>,
    sweeper: ExpirySweeper,
    events: mpsc::Receiver<TicketExpired>,
}

fn harness_with(settings: RelaySettings) -> Harness {
    let store = Arc::new(TicketStore::new());
    let locks = Arc::new(UserLockManager::new(Duration::from_secs(5)));
    let clock = Arc::new(ManualClock::starting_at(epoch()));
    let settings = Arc::new(SettingsHandle::new(settings));
    let (tx, events) = mpsc::channel(32);

    let router = Arc::new(TicketRouter::new(
        Arc::clone(&store),
        Arc::clone(&locks),
        Arc::clone(&settings),
    ));
    let sweeper = ExpirySweeper::new(
        Arc::clone(&store),
        locks,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&settings),
        tx,
    );

    Harness {
        store,
        clock,
        settings,
        router,
        sweeper,
        events,
    }
}

fn harness() -> Harness {
    harness_with(RelaySettings::default())
}

/// A ticket idle past the timeout is transitioned to closing on the next
/// sweep; a recently active one is never touched.
#[tokio::test]
async fn idle_ticket_expires_and_active_one_survives() {
    let mut h = harness();

    let idle = h.store.create(&user("idle"), None, h.clock.now()).unwrap();
    let busy = h.store.create(&user("busy"), None, h.clock.now()).unwrap();

    h.clock.advance(Duration::from_secs(595));
    h.store.touch(&busy.id, h.clock.now()).unwrap();

    // 601 seconds after creation: `idle` crossed the 600 s window, `busy`
    // has fresh activity.
    h.clock.advance(Duration::from_secs(6));
    let report = h.sweeper.sweep_once().await;

    assert_eq!(report.expired, 1);
    assert_eq!(h.store.ticket(&idle.id).unwrap().state, TicketState::Closing);
    assert_eq!(h.store.ticket(&busy.id).unwrap().state, TicketState::Open);

    let event = h.events.try_recv().expect("expiry event must be emitted");
    assert_eq!(event.ticket_id, idle.id);
    assert_eq!(event.user_id, user("idle"));
}

/// A ticket within the idle window is never swept.
#[tokio::test]
async fn fresh_ticket_is_never_swept() {
    let mut h = harness();
    h.store.create(&user("u1"), None, h.clock.now()).unwrap();

    h.clock.advance(Duration::from_secs(599));
    let report = h.sweeper.sweep_once().await;

    assert_eq!(report.expired, 0);
    assert!(h.events.try_recv().is_err());
}

/// Oldest-idle tickets are processed first when the per-sweep bound bites.
#[tokio::test]
async fn sweep_bound_prefers_longest_idle() {
    let mut settings = RelaySettings::default();
    settings.max_per_sweep = 1;
    let mut h = harness_with(settings);

    let oldest = h.store.create(&user("u1"), None, h.clock.now()).unwrap();
    h.clock.advance(Duration::from_secs(10));
    let newer = h.store.create(&user("u2"), None, h.clock.now()).unwrap();

    h.clock.advance(Duration::from_secs(601));
    let report = h.sweeper.sweep_once().await;

    assert_eq!(report.expired, 1);
    assert_eq!(
        h.store.ticket(&oldest.id).unwrap().state,
        TicketState::Closing
    );
    assert_eq!(h.store.ticket(&newer.id).unwrap().state, TicketState::Open);

    // The next pass catches the rest.
    h.sweeper.sweep_once().await;
    assert_eq!(
        h.store.ticket(&newer.id).unwrap().state,
        TicketState::Closing
    );
}

/// Revival between sweeps cancels the pending closure: the pending event
/// yields no instructions and the ticket is not re-expired while active.
#[tokio::test]
async fn revival_cancels_pending_closure() {
    let mut h = harness();

    let ticket = h.store.create(&user("u1"), None, h.clock.now()).unwrap();
    h.clock.advance(Duration::from_secs(601));
    h.sweeper.sweep_once().await;
    let event = h.events.try_recv().unwrap();

    // A moderator reply lands before the event is processed.
    h.router
        .handle_moderator_reply(
            modrelay_core::TicketRef::Id(ticket.id.clone()),
            "still looking into it".into(),
            h.clock.now(),
        )
        .await
        .unwrap();

    let closure = h.router.handle_expired(event).await.unwrap();
    assert!(closure.is_empty());
    assert_eq!(h.store.ticket(&ticket.id).unwrap().state, TicketState::Open);

    // With fresh activity the ticket is not re-swept.
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.expired, 0);
}

/// Unconfirmed archives are retried each sweep and force-closed once the
/// attempt budget is exhausted.
#[tokio::test]
async fn unconfirmed_archive_is_force_closed_after_budget() {
    let mut settings = RelaySettings::default();
    settings.max_close_attempts = 2;
    let mut h = harness_with(settings);

    let ticket = h.store.create(&user("u1"), None, h.clock.now()).unwrap();
    h.clock.advance(Duration::from_secs(601));

    // First sweep expires the ticket; the router issues attempt 1.
    h.sweeper.sweep_once().await;
    let event = h.events.try_recv().unwrap();
    h.router.handle_expired(event).await.unwrap();
    assert_eq!(h.store.ticket(&ticket.id).unwrap().close_attempts, 1);

    // No confirmation arrives. The next sweep re-emits; attempt 2.
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.retried, 1);
    let event = h.events.try_recv().unwrap();
    h.router.handle_expired(event).await.unwrap();
    assert_eq!(h.store.ticket(&ticket.id).unwrap().close_attempts, 2);

    // Budget exhausted: the next sweep force-closes instead of retrying.
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.force_closed, 1);
    assert_eq!(report.retried, 0);
    assert_eq!(h.store.ticket(&ticket.id).unwrap().state, TicketState::Closed);
}

/// Closed tickets fall out of retention after the configured window.
#[tokio::test]
async fn closed_tickets_are_pruned_after_retention() {
    let h = harness();

    let ticket = h.store.create(&user("u1"), None, h.clock.now()).unwrap();
    h.store.mark_closing(&ticket.id).unwrap();
    h.store.mark_closed(&ticket.id).unwrap();

    // Within retention (1 h default): still resolvable.
    h.clock.advance(Duration::from_secs(1800));
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.pruned, 0);
    assert!(h.store.ticket(&ticket.id).is_some());

    // Past retention: dropped.
    h.clock.advance(Duration::from_secs(3601));
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.pruned, 1);
    assert!(h.store.ticket(&ticket.id).is_none());
}

/// A runtime timeout change applies to subsequent sweeps.
#[tokio::test]
async fn runtime_timeout_change_applies_to_next_sweep() {
    let h = harness();

    let ticket = h.store.create(&user("u1"), None, h.clock.now()).unwrap();
    h.clock.advance(Duration::from_secs(120));

    // 120 s idle is fine under the default 600 s window.
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.expired, 0);

    h.settings.set_idle_timeout(Duration::from_secs(60));
    let report = h.sweeper.sweep_once().await;
    assert_eq!(report.expired, 1);
    assert_eq!(
        h.store.ticket(&ticket.id).unwrap().state,
        TicketState::Closing
    );
}
