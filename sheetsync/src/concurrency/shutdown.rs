//! Cooperative shutdown signaling for sync runs.
//!
//! Abstracts tokio's watch channels into a shutdown pair: one transmitter
//! that flips the process into the shutting-down state, and cheaply clonable
//! receivers that runs poll between rows or await inside selects.

use tokio::sync::watch;

/// Process-wide run state carried by the shutdown channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    ShuttingDown,
}

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<ShutdownState>);

impl ShutdownTx {
    /// Signals all subscribed receivers that shutdown was requested.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn shutdown(&self) {
        self.0.send_replace(ShutdownState::ShuttingDown);
    }

    /// Creates a new receiver observing this transmitter.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<ShutdownState>);

impl ShutdownRx {
    /// Returns `true` once shutdown was requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.0.borrow() == ShutdownState::ShuttingDown
    }

    /// Waits until shutdown is requested.
    ///
    /// A dropped transmitter counts as shutdown so orphaned runs terminate
    /// instead of hanging.
    pub async fn shutting_down(&mut self) {
        loop {
            if *self.0.borrow() == ShutdownState::ShuttingDown {
                return;
            }

            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Creates a connected shutdown channel pair.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(ShutdownState::Running);
    (ShutdownTx(tx), ShutdownRx(rx))
}
