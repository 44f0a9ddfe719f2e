//! Axis Status and Change Notification
//!
//! Mirrors the parameter-store model motion hosts expect: a driver first sets
//! individual status fields, then fires the parameter callbacks once so
//! subscribers see one consistent snapshot. Here the "set" half is
//! [`StatusPublisher::update`] and the "callbacks" half is
//! [`StatusPublisher::notify`], which publishes on a `tokio::sync::watch`
//! channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let publisher = StatusPublisher::new();
//! let mut rx = publisher.subscribe();
//!
//! publisher.update(|s| s.position = 1200.0);
//! publisher.notify();
//!
//! rx.changed().await?;
//! assert_eq!(rx.borrow().position, 1200.0);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Communications health of an axis.
///
/// `Healthy` is the optimistic initial state. Any transport failure moves the
/// axis to `CommsDegraded`; only a fully successful poll cycle moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommsState {
    /// Last exchange succeeded (or nothing has failed yet)
    #[default]
    Healthy,
    /// A transport failure has not yet been cleared by a full poll
    CommsDegraded,
}

/// Snapshot of everything a host displays for one axis.
///
/// Fields written by the poll cycle are overwritten in poll order. When a poll
/// aborts part way, fields after the failing step keep the previous tick's
/// values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisStatus {
    /// Absolute position in device units
    pub position: f64,
    /// Encoder position in device units (mirrors `position`)
    pub encoder_position: f64,
    /// Device reports motion in progress
    pub moving: bool,
    /// Motion complete (always the negation of `moving` after a poll)
    pub done: bool,
    /// Communications health
    pub comms: CommsState,
    /// Problem flag, raised by any reported failure
    pub problem: bool,
    /// Home switch input asserted
    pub at_home: bool,
    /// Positive limit switch input asserted
    pub high_limit: bool,
    /// Negative limit switch input asserted
    pub low_limit: bool,
    /// Controller has encoder feedback enabled
    pub has_encoder: bool,
    /// Controller supports closed-loop gains
    pub gain_support: bool,
    /// Last nonzero code read back from the device error query
    pub last_error_code: Option<i64>,
}

impl AxisStatus {
    /// Communications-error flag as hosts expect it.
    pub fn comms_error(&self) -> bool {
        self.comms == CommsState::CommsDegraded
    }
}

/// Pending axis status plus the channel its snapshots are published on.
pub struct StatusPublisher {
    pending: Mutex<AxisStatus>,
    tx: watch::Sender<AxisStatus>,
}

impl StatusPublisher {
    /// Create a publisher holding default ("unknown") status.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AxisStatus::default());
        Self {
            pending: Mutex::new(AxisStatus::default()),
            tx,
        }
    }

    /// Modify the pending status without notifying subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AxisStatus),
    {
        let mut pending = self.pending.lock();
        f(&mut pending);
    }

    /// Copy of the pending status (including unpublished changes).
    pub fn snapshot(&self) -> AxisStatus {
        self.pending.lock().clone()
    }

    /// Publish the pending status to all subscribers.
    ///
    /// Subscribers are woken even if nothing changed since the last notify,
    /// matching hosts that refresh on every callback.
    pub fn notify(&self) {
        let snapshot = self.snapshot();
        self.tx.send_replace(snapshot);
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<AxisStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
