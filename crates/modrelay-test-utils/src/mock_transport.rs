// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `RelayTransport` with injectable inbound
//! events and captured delivered instructions for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use modrelay_core::{DeliveryInstruction, InboundEvent, RelayError, RelayTransport};

/// A mock transport for testing.
///
/// Provides two queues:
/// - **inbound**: events injected via `inject_event()` are returned by
///   `next_event()`
/// - **delivered**: instructions passed to `deliver()` are captured and
///   retrievable via `delivered()`
///
/// `fail_archives(true)` makes `ArchiveTicket` deliveries fail, for
/// exercising the archive retry path.
pub struct MockTransport {
    inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    delivered: Arc<Mutex<Vec<DeliveryInstruction>>>,
    notify: Arc<Notify>,
    fail_archives: AtomicBool,
    closed: AtomicBool,
}

impl MockTransport {
    /// Create a new mock transport with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            delivered: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            fail_archives: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Inject an inbound event into the receive queue.
    ///
    /// The next call to `next_event()` will return this event.
    pub async fn inject_event(&self, event: InboundEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Mark the inbound feed closed. `next_event()` errors once the queue
    /// drains.
    pub fn close_feed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Make subsequent `ArchiveTicket` deliveries fail.
    pub fn fail_archives(&self, fail: bool) {
        self.fail_archives.store(fail, Ordering::SeqCst);
    }

    /// All instructions that were delivered so far.
    pub async fn delivered(&self) -> Vec<DeliveryInstruction> {
        self.delivered.lock().await.clone()
    }

    /// Count of delivered instructions.
    pub async fn delivered_count(&self) -> usize {
        self.delivered.lock().await.len()
    }

    /// Clear the captured deliveries.
    pub async fn clear_delivered(&self) {
        self.delivered.lock().await.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<InboundEvent, RelayError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(RelayError::Transport {
                    message: "mock transport feed closed".to_string(),
                    source: None,
                });
            }
            // Wait for notification that a new event was injected.
            self.notify.notified().await;
        }
    }

    async fn deliver(&self, instruction: DeliveryInstruction) -> Result<(), RelayError> {
        if self.fail_archives.load(Ordering::SeqCst)
            && matches!(instruction, DeliveryInstruction::ArchiveTicket { .. })
        {
            return Err(RelayError::Transport {
                message: "mock transport refused to archive".to_string(),
                source: None,
            });
        }
        self.delivered.lock().await.push(instruction);
        Ok(())
    }
}
