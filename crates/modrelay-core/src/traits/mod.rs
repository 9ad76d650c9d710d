// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the ticket session core and its collaborators.

pub mod transport;

pub use transport::RelayTransport;
