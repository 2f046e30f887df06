//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Turn the first delivery into a one-shot shutdown request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered eagerly, so a signal delivered before anyone
//!   waits is not lost
//! - No other signals are handled

use std::fmt;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Which signal requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Interrupt,
    Terminate,
}

impl fmt::Display for Received {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Received::Interrupt => f.write_str("SIGINT"),
            Received::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Registered interrupt and terminate handlers.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    /// Register the handlers.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Register the handlers.
    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first of SIGINT or SIGTERM.
    #[cfg(unix)]
    pub async fn recv(mut self) -> Received {
        let received = tokio::select! {
            _ = self.interrupt.recv() => Received::Interrupt,
            _ = self.terminate.recv() => Received::Terminate,
        };
        tracing::info!(signal = %received, "Received shutdown signal");
        received
    }

    /// Wait for Ctrl+C.
    #[cfg(not(unix))]
    pub async fn recv(self) -> Received {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!(signal = %Received::Interrupt, "Received shutdown signal");
        Received::Interrupt
    }
}
