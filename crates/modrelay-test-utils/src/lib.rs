// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic test doubles for the modrelay workspace.
//!
//! [`ManualClock`] replaces wall-clock time so expiry tests advance
//! virtual time and assert sweep effects; [`MockTransport`] implements
//! `RelayTransport` with injectable inbound events and captured
//! deliveries.

pub mod manual_clock;
pub mod mock_transport;

pub use manual_clock::ManualClock;
pub use mock_transport::MockTransport;
