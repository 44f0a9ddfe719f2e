//! Two-Rate Poll Scheduler
//!
//! Drives [`MotorAxis::poll`] from a background task. After each poll the
//! scheduler sleeps for the moving period if the axis reported motion and for
//! the idle period otherwise. A [`AxisPoller::wake`] cuts the current sleep
//! short and forces a few polls at the moving rate, so the start of motion is
//! picked up even if the first poll lands before the controller reports it.
//!
//! Drivers expect poll and motion calls for one axis never to overlap. Hosts
//! issue motion through [`AxisPoller::command`], which takes the same turn
//! as the poll task and wakes the scheduler afterwards.
//!
//! Poll failures are not fatal. The driver has already degraded its status;
//! the scheduler simply tries again on the next tick.

use crate::capabilities::MotorAxis;
use crate::driver::PollPeriods;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

/// Polls at the moving rate after a wake, regardless of the moving flag.
pub const FORCED_FAST_POLLS: u32 = 2;

/// Handle to a running poll task.
pub struct AxisPoller {
    axis: Arc<dyn MotorAxis>,
    turn: Arc<Mutex<()>>,
    wake: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AxisPoller {
    /// Start polling `axis` on the current runtime.
    pub fn spawn(axis: Arc<dyn MotorAxis>, periods: PollPeriods) -> Self {
        let turn = Arc::new(Mutex::new(()));
        let wake = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_poll_loop(
            axis.clone(),
            periods,
            turn.clone(),
            wake.clone(),
            shutdown_rx,
        ));

        Self {
            axis,
            turn,
            wake,
            shutdown_tx,
            task,
        }
    }

    /// Poll immediately and keep the fast rate for [`FORCED_FAST_POLLS`] cycles.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Run a command against the axis between two polls, then [`wake`](Self::wake).
    ///
    /// ```rust,ignore
    /// poller
    ///     .command(|axis| async move { axis.move_to(51200.0, false, profile).await })
    ///     .await?;
    /// ```
    pub async fn command<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(Arc<dyn MotorAxis>) -> Fut,
        Fut: Future<Output = T>,
    {
        let result = {
            let _turn = self.turn.lock().await;
            f(self.axis.clone()).await
        };
        self.wake();
        result
    }

    /// Stop the poll task and wait for it to finish its current cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poll task ended abnormally");
        }
    }
}

async fn run_poll_loop(
    axis: Arc<dyn MotorAxis>,
    periods: PollPeriods,
    turn: Arc<Mutex<()>>,
    wake: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut forced_fast = 0u32;

    loop {
        let polled = {
            let _turn = turn.lock().await;
            axis.poll().await
        };
        let moving = match polled {
            Ok(moving) => moving,
            Err(e) => {
                tracing::debug!(error = %e, "Poll cycle failed");
                false
            }
        };

        let period = if forced_fast > 0 {
            forced_fast -= 1;
            periods.moving
        } else {
            periods.for_moving(moving)
        };

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = wake.notified() => {
                forced_fast = FORCED_FAST_POLLS;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Poll task stopped");
}
