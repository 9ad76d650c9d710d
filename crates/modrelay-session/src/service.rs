// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay event loop.
//!
//! Consumes the transport's inbound feed and the sweeper's expiry events
//! under a cancellation token, dispatches to the router, and hands
//! instruction batches to the transport fire-and-forget: delivery runs in
//! spawned tasks so a slow remote call never blocks the loop or extends a
//! user lock.
//!
//! Error mapping is one outcome per class: `UnknownTicket` is reported as
//! an explicit rejection, `LockTimeout`/`RateLimited` log as retryable
//! warnings, and `DuplicateTicket` is an invariant alarm that is never
//! swallowed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use modrelay_core::{
    DeliveryInstruction, InboundEvent, RelayError, RelayTransport, TicketExpired,
};

use crate::router::TicketRouter;

/// Drives the ticket session core against a transport.
pub struct RelayService {
    transport: Arc<dyn RelayTransport>,
    router: Arc<TicketRouter>,
    expired_rx: mpsc::Receiver<TicketExpired>,
}

impl RelayService {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        router: Arc<TicketRouter>,
        expired_rx: mpsc::Receiver<TicketExpired>,
    ) -> Self {
        Self {
            transport,
            router,
            expired_rx,
        }
    }

    /// Run until the cancellation token fires or the transport feed
    /// closes. In-flight deliveries are drained before returning.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), RelayError> {
        info!(transport = self.transport.name(), "relay service running");
        let deliveries = TaskTracker::new();

        loop {
            tokio::select! {
                event = self.transport.next_event() => {
                    match event {
                        Ok(event) => self.dispatch(event, &deliveries).await,
                        Err(e) => {
                            error!(error = %e, "transport receive error");
                            if e.to_string().contains("closed") {
                                break;
                            }
                        }
                    }
                }
                Some(expired) = self.expired_rx.recv() => {
                    match self.router.handle_expired(expired).await {
                        Ok(instructions) => self.deliver_all(instructions, &deliveries),
                        Err(e) => warn!(error = %e, "failed to finalize expired ticket"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping relay service");
                    break;
                }
            }
        }

        // Drain in-flight delivery tasks.
        deliveries.close();
        deliveries.wait().await;

        info!("relay service stopped");
        Ok(())
    }

    async fn dispatch(&self, event: InboundEvent, deliveries: &TaskTracker) {
        match event {
            InboundEvent::UserMessage {
                user_id,
                payload,
                timestamp,
            } => {
                match self
                    .router
                    .handle_user_message(user_id.clone(), payload, timestamp)
                    .await
                {
                    Ok(instructions) => self.deliver_all(instructions, deliveries),
                    Err(e @ RelayError::DuplicateTicket { .. }) => {
                        // The lock was bypassed somewhere; this must never
                        // pass unnoticed.
                        error!(error = %e, user = %user_id, "ticket invariant violated");
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, user = %user_id, "user message deferred");
                    }
                    Err(e) => {
                        error!(error = %e, user = %user_id, "failed to handle user message");
                    }
                }
            }
            InboundEvent::ModeratorReply {
                ticket,
                payload,
                timestamp,
            } => {
                match self
                    .router
                    .handle_moderator_reply(ticket.clone(), payload, timestamp)
                    .await
                {
                    Ok(instructions) => self.deliver_all(instructions, deliveries),
                    Err(RelayError::UnknownTicket { reference }) => {
                        // Explicit rejection: the reply target vanished
                        // (already closed); the moderator is told, the
                        // message is not silently dropped.
                        warn!(reference = %reference, "reply rejected: ticket is no longer active");
                    }
                    Err(e) => {
                        warn!(error = %e, ticket = %ticket, "failed to route moderator reply");
                    }
                }
            }
            InboundEvent::Admin { command } => {
                if let Err(e) = self.router.reconfigure(command) {
                    warn!(error = %e, "admin reconfiguration rejected");
                }
            }
        }
    }

    /// Hand instructions to the transport without blocking the loop.
    ///
    /// Archive instructions close the confirmation loop here: a successful
    /// delivery finalizes the close, a failed one is left for the
    /// sweeper's retry budget.
    fn deliver_all(&self, instructions: Vec<DeliveryInstruction>, deliveries: &TaskTracker) {
        for instruction in instructions {
            let transport = Arc::clone(&self.transport);
            let router = Arc::clone(&self.router);
            deliveries.spawn(async move {
                let archived_ticket = match &instruction {
                    DeliveryInstruction::ArchiveTicket { ticket_id } => Some(ticket_id.clone()),
                    _ => None,
                };

                match transport.deliver(instruction).await {
                    Ok(()) => {
                        if let Some(ticket_id) = archived_ticket
                            && let Err(e) = router.confirm_archived(&ticket_id).await
                        {
                            // A revival racing the archive confirmation
                            // lands here; the sweeper re-evaluates.
                            warn!(ticket = %ticket_id, error = %e, "archive confirmation rejected");
                        }
                    }
                    Err(e @ RelayError::RateLimited { .. }) => {
                        warn!(error = %e, "delivery backpressure from transport");
                    }
                    Err(e) => {
                        if let Some(ticket_id) = archived_ticket {
                            router.archive_failed(&ticket_id, &e);
                        } else {
                            warn!(error = %e, "delivery failed");
                        }
                    }
                }
            });
        }
    }
}
