// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the modrelay ticket relay.

use std::time::Duration;

use thiserror::Error;

use crate::types::{TicketId, TicketState, UserId};

/// The primary error type used across the ticket store, lock manager,
/// router, and transport seam.
#[derive(Debug, Error)]
pub enum RelayError {
    /// An open ticket already existed for the user at creation time.
    ///
    /// This is an invariant breach, not a user error: creation is only
    /// legal while holding the per-user session lock, so a duplicate means
    /// the lock was bypassed. Callers log-and-alert, never swallow.
    #[error("duplicate ticket for user {user}: session lock was bypassed")]
    DuplicateTicket { user: UserId },

    /// The referenced ticket is absent or already closed.
    #[error("ticket {ticket} not found or no longer active")]
    TicketNotFound { ticket: TicketId },

    /// A moderator reply referenced a ticket that could not be resolved.
    /// Reported back to the moderator, never retried.
    #[error("no active ticket for {reference}")]
    UnknownTicket { reference: String },

    /// Out-of-order state transition other than the documented idempotent
    /// closes. Logged and rejected.
    #[error("invalid transition for ticket {ticket}: {from} -> {to}")]
    InvalidState {
        ticket: TicketId,
        from: TicketState,
        to: TicketState,
    },

    /// A session lock could not be acquired within the bounded wait.
    /// Transient; surfaced to the caller as retryable.
    #[error("timed out after {waited:?} waiting for the session lock of user {user}")]
    LockTimeout { user: UserId, waited: Duration },

    /// The transport collaborator signalled backpressure. Propagated, not
    /// retried by the core.
    #[error("rate limited by transport")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport failure (connection, delivery, malformed event).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors surfaced at startup or reconfiguration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::LockTimeout { .. } | RelayError::RateLimited { .. }
        )
    }
}
