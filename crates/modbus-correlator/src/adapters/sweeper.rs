//! Background sweep of expired timeout reservations
//!
//! Without it, an id that timed out and never received a late frame would
//! stay reserved forever and the bounded id space would slowly drain.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::service::Correlator;

/// Sweep `correlator` every `interval`, forever.
pub async fn sweep_task<R>(correlator: Arc<Correlator<R>>, interval: Duration)
where
    R: Clone + Send + Sync + 'static,
{
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let reclaimed = correlator.sweep_expired();
        if reclaimed > 0 {
            debug!(reclaimed, "Sweeper reclaimed transaction ids");
        }
    }
}

/// Handle to a running sweeper. Dropping it stops the sweep.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the sweeper at the correlator's configured interval.
pub fn spawn_sweeper<R>(correlator: Arc<Correlator<R>>) -> SweeperHandle
where
    R: Clone + Send + Sync + 'static,
{
    let interval = correlator.config().sweep_interval();
    SweeperHandle {
        task: tokio::spawn(sweep_task(correlator, interval)),
    }
}
