// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the modrelay ticket relay.
//!
//! This crate provides the foundational types, error taxonomy, clock
//! abstraction, and the transport trait seam used throughout the modrelay
//! workspace. The ticket session core itself lives in `modrelay-session`.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::RelayError;
pub use traits::RelayTransport;
pub use types::{
    AdminCommand, ChannelId, DeliveryInstruction, InboundEvent, Ticket, TicketExpired, TicketId,
    TicketRef, TicketState, UserId,
};
