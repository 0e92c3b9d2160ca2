// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! ```text
//!  SIGTERM / SIGINT / SIGQUIT ─┐
//!  Ctrl+C (non-unix)          ├──▶ ShutdownCoordinator ──watch──▶ ShutdownListener (writer)
//!  plugin start failure       │          first reason wins        ShutdownListener (simulation)
//!  writer task exits early ───┘
//! ```
//!
//! The first [`ShutdownReason`] is kept; later triggers are ignored. A
//! listener created after shutdown resolves immediately.

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn};

/// Why the runtime is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal arrived.
    Signal(&'static str),
    /// Requested from inside the process.
    Requested,
    /// The plugin failed to start.
    StartFailed,
    /// The record writer exited while the session was running.
    WriterExited,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {}", name),
            Self::Requested => f.write_str("requested"),
            Self::StartFailed => f.write_str("plugin start failed"),
            Self::WriterExited => f.write_str("record writer exited"),
        }
    }
}

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across the runtime's tasks.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that has not been triggered.
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Returns a listener for the shutdown notification.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            state: self.state.subscribe(),
        }
    }

    /// Triggers shutdown with `reason`. Returns `false` if already triggered.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            info!(%reason, "Shutdown initiated");
        }
        first
    }

    /// Triggers shutdown from inside the process.
    pub fn initiate_shutdown(&self) {
        self.trigger(ShutdownReason::Requested);
    }

    /// Returns the reason, once shutdown has been triggered.
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.state.borrow()
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.reason().is_some()
    }

    /// Waits for an OS signal or any other trigger and returns the reason.
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut listener = self.listener();
        tokio::select! {
            reason = listener.triggered() => reason,
            name = os_signal() => {
                self.trigger(ShutdownReason::Signal(name));
                self.reason().unwrap_or(ShutdownReason::Signal(name))
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to background tasks.
pub struct ShutdownListener {
    state: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered.
    ///
    /// If every coordinator is gone without triggering, this resolves with
    /// [`ShutdownReason::Requested`].
    pub async fn triggered(&mut self) -> ShutdownReason {
        match self.state.wait_for(Option::is_some).await {
            Ok(reason) => reason.unwrap_or(ShutdownReason::Requested),
            Err(_) => ShutdownReason::Requested,
        }
    }
}

#[cfg(unix)]
async fn os_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::quit()),
    );
    let (mut sigterm, mut sigint, mut sigquit) = match handlers {
        (Ok(term), Ok(int), Ok(quit)) => (term, int, quit),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            warn!(error = %e, "Failed to register signal handlers, falling back to Ctrl+C");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = sigquit.recv() => "SIGQUIT",
    }
}

#[cfg(not(unix))]
async fn os_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to register Ctrl+C handler; waiting for in-process shutdown only");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}

// =============================================================================
// ShutdownGuard
// =============================================================================

/// Triggers shutdown with a fixed reason when dropped, unless disarmed.
///
/// Held by tasks whose early exit must bring the whole runtime down.
pub struct ShutdownGuard {
    coordinator: ShutdownCoordinator,
    reason: Option<ShutdownReason>,
}

impl ShutdownGuard {
    /// Creates an armed guard.
    pub fn new(coordinator: ShutdownCoordinator, reason: ShutdownReason) -> Self {
        Self {
            coordinator,
            reason: Some(reason),
        }
    }

    /// Disarms the guard.
    pub fn disarm(mut self) {
        self.reason = None;
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Some(reason) = self.reason.take() {
            if self.coordinator.trigger(reason) {
                warn!(%reason, "Task ended unexpectedly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let coordinator = ShutdownCoordinator::new();
        let mut listener = coordinator.listener();

        assert!(coordinator.trigger(ShutdownReason::StartFailed));
        assert!(!coordinator.trigger(ShutdownReason::Signal("SIGTERM")));

        assert_eq!(listener.triggered().await, ShutdownReason::StartFailed);
        assert_eq!(coordinator.reason(), Some(ShutdownReason::StartFailed));
    }

    #[tokio::test]
    async fn test_late_listener_resolves_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        let mut listener = coordinator.listener();
        let reason = tokio::time::timeout(Duration::from_millis(100), listener.triggered())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[tokio::test]
    async fn test_wait_for_in_process_shutdown() {
        let coordinator = ShutdownCoordinator::new();

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        let reason = tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[test]
    fn test_guard_triggers_on_drop() {
        let coordinator = ShutdownCoordinator::new();
        drop(ShutdownGuard::new(coordinator.clone(), ShutdownReason::WriterExited));
        assert_eq!(coordinator.reason(), Some(ShutdownReason::WriterExited));
    }

    #[test]
    fn test_disarmed_guard_is_silent() {
        let coordinator = ShutdownCoordinator::new();
        ShutdownGuard::new(coordinator.clone(), ShutdownReason::WriterExited).disarm();
        assert!(!coordinator.is_shutdown_initiated());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ShutdownReason::Signal("SIGINT").to_string(), "received SIGINT");
        assert_eq!(ShutdownReason::WriterExited.to_string(), "record writer exited");
    }
}
