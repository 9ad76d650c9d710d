// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daemon wiring for `modrelay serve`.
//!
//! Builds the ticket session core (store, locks, router, sweeper), installs
//! signal handling, and runs the relay service against the stdio transport
//! until shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use modrelay_config::ModrelayConfig;
use modrelay_core::{Clock, RelayError, RelayTransport, SystemClock};
use modrelay_session::{
    ExpirySweeper, RelayService, RelaySettings, SettingsHandle, TicketRouter, TicketStore,
    UserLockManager,
};

use crate::stdio::StdioTransport;

/// Backlog of sweeper expiry events awaiting the service loop.
const EXPIRY_CHANNEL_CAPACITY: usize = 256;

pub async fn run(config: ModrelayConfig) -> Result<(), RelayError> {
    let settings = RelaySettings::from_config(&config.relay);
    info!(
        agent = config.agent.name.as_str(),
        idle_timeout_secs = settings.idle_timeout.as_secs(),
        sweep_interval_secs = settings.sweep_interval.as_secs(),
        "starting relay daemon"
    );

    let store = Arc::new(TicketStore::new());
    let locks = Arc::new(UserLockManager::new(settings.lock_wait));
    let settings = Arc::new(SettingsHandle::new(settings));
    let clock = Arc::new(SystemClock) as Arc<dyn Clock>;
    let (expired_tx, expired_rx) = mpsc::channel(EXPIRY_CHANNEL_CAPACITY);

    let router = Arc::new(TicketRouter::new(
        Arc::clone(&store),
        Arc::clone(&locks),
        Arc::clone(&settings),
    ));
    let sweeper = ExpirySweeper::new(store, locks, clock, settings, expired_tx);

    let mut transport = StdioTransport::new();
    transport.connect().await?;
    let transport = Arc::new(transport) as Arc<dyn RelayTransport>;

    let cancel = install_signal_handler();

    let sweeper_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { sweeper.run(cancel).await })
    };

    let service = RelayService::new(transport, router, expired_rx);
    let result = service.run(cancel.clone()).await;

    // The service may have stopped because the inbound feed closed; make
    // sure the sweeper follows.
    cancel.cancel();
    sweeper_task
        .await
        .map_err(|e| RelayError::Internal(format!("sweeper task panicked: {e}")))?;

    info!("relay daemon stopped");
    result
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}
