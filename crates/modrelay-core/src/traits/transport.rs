// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for chat platform integrations.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{DeliveryInstruction, InboundEvent};

/// Adapter connecting the ticket session core to a chat platform.
///
/// The core consumes the inbound event feed and emits delivery
/// instructions; everything platform-specific (DM mechanics, thread
/// archival, slash-command parsing, rate-limit retries) lives behind this
/// trait.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Human-readable name of this transport, for logs.
    fn name(&self) -> &str;

    /// Establishes the connection to the platform.
    async fn connect(&mut self) -> Result<(), RelayError>;

    /// Returns the next inbound event. Pends until one is available;
    /// errors with [`RelayError::Transport`] once the feed is closed.
    async fn next_event(&self) -> Result<InboundEvent, RelayError>;

    /// Executes one delivery instruction. May surface
    /// [`RelayError::RateLimited`] as backpressure; the core propagates it
    /// without retrying.
    async fn deliver(&self, instruction: DeliveryInstruction) -> Result<(), RelayError>;
}
