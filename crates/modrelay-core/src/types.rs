// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the modrelay workspace.
//!
//! External identifiers (`UserId`, `TicketId`, `ChannelId`) are the only
//! handles components pass around; the ticket store owns the `Ticket`
//! values themselves and hands out cloned snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// External identifier of the human on the DM side of the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, stable identifier of one ticket (conversation thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl TicketId {
    /// Mints a fresh ticket id. Reopened conversations always get a new id;
    /// ids are never reused.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the shared relay channel tickets are posted into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States in the per-ticket lifecycle.
///
/// `Open -> Closing` when the sweeper detects idleness, `Closing -> Open`
/// on touch (revival), `Closing -> Closed` once the transport confirms
/// archival or the retry budget runs out. `Closed` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum TicketState {
    Open,
    Closing,
    Closed,
}

/// One open conversation between a user and the moderator pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    /// Relay channel captured at creation time. Reconfiguring the channel
    /// does not retroactively move in-flight tickets.
    pub channel: Option<ChannelId>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub state: TicketState,
    /// Archive delivery attempts made while `Closing`.
    pub close_attempts: u32,
}

impl Ticket {
    /// Whether this ticket still occupies its user's active slot.
    pub fn is_active(&self) -> bool {
        self.state != TicketState::Closed
    }
}

/// Reference to a ticket in a moderator reply: explicit id, or the user id
/// for convenience commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketRef {
    Id(TicketId),
    User(UserId),
}

impl std::fmt::Display for TicketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketRef::Id(id) => write!(f, "ticket:{id}"),
            TicketRef::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// Runtime reconfiguration commands accepted from admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Change the relay channel for subsequently created tickets.
    SetChannel { channel: ChannelId },
    /// Change the idle timeout for subsequent sweeps.
    SetTimeout { idle_timeout_secs: u64 },
}

/// An inbound event from the transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A DM from an end user.
    UserMessage {
        user_id: UserId,
        payload: String,
        timestamp: DateTime<Utc>,
    },
    /// A moderator reply addressed to a ticket.
    ModeratorReply {
        ticket: TicketRef,
        payload: String,
        timestamp: DateTime<Utc>,
    },
    /// An admin reconfiguration command.
    Admin { command: AdminCommand },
}

/// An outbound delivery instruction for the transport collaborator.
///
/// The core never talks to the remote platform itself; it emits these and
/// the transport executes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryInstruction {
    /// Post a user's message into the ticket's thread in the relay channel.
    PostToTicket {
        ticket_id: TicketId,
        channel: Option<ChannelId>,
        payload: String,
    },
    /// DM a moderator reply back to the user.
    DmToUser { user_id: UserId, payload: String },
    /// Archive/lock the underlying thread of an expired ticket.
    ArchiveTicket { ticket_id: TicketId },
    /// Tell the relay channel that a ticket was closed.
    NotifyClosure { ticket_id: TicketId, user_id: UserId },
}

/// Event emitted by the sweeper when an idle ticket enters `Closing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketExpired {
    pub ticket_id: TicketId,
    pub user_id: UserId,
}
