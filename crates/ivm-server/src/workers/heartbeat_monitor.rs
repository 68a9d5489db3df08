//! Heartbeat monitor: terminates sockets that stop answering pings.
//!
//! Every sweep, a connection whose liveness flag is still clear since the
//! previous sweep is terminated and unregistered. Survivors have the flag
//! cleared and get a fresh ping; any pong or inbound frame sets it again.
//! A dead peer is therefore dropped within two intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ws::registry::ConnectionRegistry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pinged: usize,
    pub terminated: usize,
}

/// Run one liveness pass over every registered connection.
pub fn sweep(registry: &ConnectionRegistry) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    for conn in registry.connections() {
        if !conn.take_alive() || !conn.is_open() {
            tracing::info!(
                user_id = %conn.user_id(),
                conn_id = %conn.id(),
                last_activity = %conn.last_activity(),
                "Terminating unresponsive connection"
            );
            conn.terminate();
            registry.unregister(&conn);
            outcome.terminated += 1;
        } else if conn.ping() {
            outcome.pinged += 1;
        }
    }

    outcome
}

pub fn start(registry: Arc<ConnectionRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; connections get a full period.
        interval.tick().await;

        tracing::info!("Heartbeat monitor started (every {}s)", period.as_secs());

        loop {
            interval.tick().await;

            let outcome = sweep(&registry);
            if outcome.terminated > 0 {
                tracing::info!(
                    terminated = outcome.terminated,
                    remaining = outcome.pinged,
                    "Heartbeat monitor: dropped dead connections"
                );
            } else {
                tracing::debug!(pinged = outcome.pinged, "Heartbeat sweep complete");
            }
        }
    })
}
