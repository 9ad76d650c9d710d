// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The public-facing coordinator of the ticket session core.
//!
//! Translates inbound events into store and lock operations and produces
//! outbound delivery instructions. All mutation of a user's ticket happens
//! inside that user's session lock; the router never blocks on remote
//! delivery, so one user's slow transport call cannot delay another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use modrelay_core::{
    AdminCommand, ChannelId, DeliveryInstruction, RelayError, Ticket, TicketExpired, TicketId,
    TicketRef, TicketState, UserId,
};

use crate::lock::UserLockManager;
use crate::settings::SettingsHandle;
use crate::store::TicketStore;

/// Guidance DM sent to a user whose first message just opened a ticket.
const FIRST_CONTACT_GREETING: &str = "Your message has been forwarded to the moderators. \
They will respond as soon as possible; replies arrive here as direct messages.";

/// Coordinates the ticket store, session locks, and live settings.
pub struct TicketRouter {
    store: Arc<TicketStore>,
    locks: Arc<UserLockManager>,
    settings: Arc<SettingsHandle>,
}

impl TicketRouter {
    pub fn new(
        store: Arc<TicketStore>,
        locks: Arc<UserLockManager>,
        settings: Arc<SettingsHandle>,
    ) -> Self {
        Self {
            store,
            locks,
            settings,
        }
    }

    /// Handle an inbound user DM: find-or-create the user's ticket, record
    /// the activity, and emit the instruction to post the payload into the
    /// ticket's thread.
    ///
    /// A brand-new conversation additionally emits the first-contact
    /// guidance DM. Reopening after a close is transparent: the user gets
    /// a fresh ticket without ever seeing an error.
    pub async fn handle_user_message(
        &self,
        user_id: UserId,
        payload: String,
        at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryInstruction>, RelayError> {
        let store = Arc::clone(&self.store);
        let settings = Arc::clone(&self.settings);
        let lock_key = user_id.clone();
        self.locks
            .with_user_lock(&lock_key, || async move {
                let mut instructions = Vec::new();

                let ticket = match store.open_ticket_for(&user_id) {
                    Some(ticket) => {
                        // Touching a closing ticket revives it, cancelling
                        // any pending closure.
                        store.touch(&ticket.id, at)?;
                        ticket
                    }
                    None => {
                        let channel = settings.current().channel.clone();
                        let ticket = store.create(&user_id, channel, at)?;
                        instructions.push(DeliveryInstruction::DmToUser {
                            user_id: user_id.clone(),
                            payload: FIRST_CONTACT_GREETING.to_string(),
                        });
                        ticket
                    }
                };

                instructions.push(DeliveryInstruction::PostToTicket {
                    ticket_id: ticket.id.clone(),
                    channel: ticket.channel.clone(),
                    payload,
                });
                Ok(instructions)
            })
            .await
    }

    /// Handle a moderator reply: resolve the target ticket (by id, or by
    /// user id for convenience commands), record the activity, and emit
    /// the DM back to the user plus a delivery notice into the ticket's
    /// thread.
    ///
    /// Replying to an expired or unknown ticket is an explicit
    /// [`RelayError::UnknownTicket`] rejection, never a silent drop. A
    /// reply that lands while the ticket is `Closing` revives it.
    pub async fn handle_moderator_reply(
        &self,
        ticket_ref: TicketRef,
        payload: String,
        at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryInstruction>, RelayError> {
        let ticket = self.resolve(&ticket_ref)?;
        let user_id = ticket.user_id.clone();
        let store = Arc::clone(&self.store);
        let lock_key = user_id.clone();

        self.locks
            .with_user_lock(&lock_key, || async move {
                // Touch before anything else: if the sweeper is closing
                // this ticket concurrently, the touch revives it and the
                // reply is still delivered.
                store.touch(&ticket.id, at).map_err(|_| {
                    RelayError::UnknownTicket {
                        reference: ticket_ref.to_string(),
                    }
                })?;

                debug!(ticket = %ticket.id, user = %user_id, "moderator reply routed");
                Ok(vec![
                    DeliveryInstruction::DmToUser {
                        user_id: user_id.clone(),
                        payload,
                    },
                    DeliveryInstruction::PostToTicket {
                        ticket_id: ticket.id.clone(),
                        channel: ticket.channel.clone(),
                        payload: format!("Moderator reply delivered to user {user_id}."),
                    },
                ])
            })
            .await
    }

    /// Apply an admin reconfiguration. Takes effect for subsequent
    /// operations only; in-flight tickets keep the channel they were
    /// created under.
    pub fn reconfigure(&self, command: AdminCommand) -> Result<(), RelayError> {
        match command {
            AdminCommand::SetChannel { channel } => {
                if channel.0.trim().is_empty() {
                    return Err(RelayError::Config(
                        "relay channel id must not be empty".to_string(),
                    ));
                }
                info!(channel = %channel, "relay channel reconfigured");
                self.settings.set_channel(channel);
            }
            AdminCommand::SetTimeout { idle_timeout_secs } => {
                if idle_timeout_secs == 0 {
                    return Err(RelayError::Config(
                        "idle timeout must be at least 1 second".to_string(),
                    ));
                }
                info!(idle_timeout_secs, "idle timeout reconfigured");
                self.settings
                    .set_idle_timeout(std::time::Duration::from_secs(idle_timeout_secs));
            }
        }
        Ok(())
    }

    /// Consume a sweeper expiry event and emit the closure instructions.
    ///
    /// Re-checked under the user's lock: if activity revived the ticket
    /// after the sweeper marked it, the pending closure is cancelled and
    /// nothing is emitted. The closure notice goes out with the first
    /// archive attempt only; retries re-emit just the archive instruction.
    pub async fn handle_expired(
        &self,
        event: TicketExpired,
    ) -> Result<Vec<DeliveryInstruction>, RelayError> {
        let store = Arc::clone(&self.store);
        let lock_key = event.user_id.clone();
        self.locks
            .with_user_lock(&lock_key, || async move {
                let Some(ticket) = store.ticket(&event.ticket_id) else {
                    // Already pruned from retention.
                    return Ok(Vec::new());
                };

                match ticket.state {
                    TicketState::Open => {
                        debug!(ticket = %ticket.id, "ticket revived, closure cancelled");
                        Ok(Vec::new())
                    }
                    TicketState::Closed => Ok(Vec::new()),
                    TicketState::Closing => {
                        let attempts = store.record_close_attempt(&event.ticket_id)?;
                        let mut instructions = vec![DeliveryInstruction::ArchiveTicket {
                            ticket_id: ticket.id.clone(),
                        }];
                        if attempts == 1 {
                            instructions.push(DeliveryInstruction::NotifyClosure {
                                ticket_id: ticket.id.clone(),
                                user_id: ticket.user_id.clone(),
                            });
                        } else {
                            debug!(
                                ticket = %ticket.id,
                                attempts,
                                "retrying ticket archive"
                            );
                        }
                        Ok(instructions)
                    }
                }
            })
            .await
    }

    /// Transport confirmed the ticket's thread was archived: finalize the
    /// close. A stale confirmation for a ticket that was revived in the
    /// meantime is rejected as [`RelayError::InvalidState`].
    pub async fn confirm_archived(&self, ticket_id: &TicketId) -> Result<(), RelayError> {
        let ticket = self
            .store
            .ticket(ticket_id)
            .ok_or_else(|| RelayError::TicketNotFound {
                ticket: ticket_id.clone(),
            })?;
        let store = Arc::clone(&self.store);
        let id = ticket_id.clone();

        self.locks
            .with_user_lock(&ticket.user_id, || async move {
                store.mark_closed(&id)?;
                Ok(())
            })
            .await
    }

    /// Transport failed to archive the ticket's thread. The attempt was
    /// already counted when the instruction was issued; the sweeper
    /// re-issues it next tick until the budget runs out.
    pub fn archive_failed(&self, ticket_id: &TicketId, error: &RelayError) {
        match self.store.ticket(ticket_id) {
            Some(ticket) => warn!(
                ticket = %ticket_id,
                attempts = ticket.close_attempts,
                error = %error,
                "ticket archive failed, will retry next sweep"
            ),
            None => warn!(ticket = %ticket_id, error = %error, "archive failed for unknown ticket"),
        }
    }

    /// Snapshot of the current routing settings (diagnostics).
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.settings.current().channel.clone()
    }

    fn resolve(&self, ticket_ref: &TicketRef) -> Result<Ticket, RelayError> {
        let ticket = match ticket_ref {
            TicketRef::Id(id) => self.store.ticket(id).filter(Ticket::is_active),
            TicketRef::User(user) => self.store.open_ticket_for(user),
        };
        ticket.ok_or_else(|| RelayError::UnknownTicket {
            reference: ticket_ref.to_string(),
        })
    }
}
