//! Background watchdog kicker.
//!
//! The head's internal watchdog disarms the laser if no traffic arrives
//! during long firing operations. The kicker task wakes once per second
//! and, while the fire sequence has raised the activity flag, issues a
//! harmless `SS?` query through the shared command channel to reset the
//! timer. The flag travels over a `watch` channel rather than shared
//! mutable state, and the task shuts down when the controller is dropped.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::channel::CommandChannel;

const KICK_INTERVAL: Duration = Duration::from_secs(1);
const KICK_COMMAND: &str = "SS?";

/// Handle to the spawned kicker task.
pub(crate) struct Kicker {
    handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Kicker {
    /// Spawn the kicker loop. Called once per controller lifetime, on the
    /// first successful connect.
    pub(crate) fn spawn(channel: Arc<CommandChannel>, active: watch::Receiver<bool>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(KICK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            debug!("watchdog kicker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !*active.borrow() {
                            continue;
                        }
                        // Result intentionally ignored: the query exists only
                        // to reset the head's watchdog timer.
                        match channel.send(KICK_COMMAND).await {
                            Ok(_) => debug!("watchdog kick sent"),
                            Err(e) => warn!("watchdog kick failed: {e}"),
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!("watchdog kicker stopped");
        });

        Self {
            handle,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Signal the task to exit at its next wake-up.
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Whether the task has already exited.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
