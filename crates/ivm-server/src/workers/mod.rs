//! Background workers: periodic tasks running alongside the server.

pub mod heartbeat_monitor;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::AppState;

/// Start all background worker tasks. Returns handles that can be
/// used to abort them on shutdown.
pub fn start_all_workers(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let period = Duration::from_secs(state.config.realtime.heartbeat_interval_secs.max(1));
    vec![heartbeat_monitor::start(state.registry.clone(), period)]
}
