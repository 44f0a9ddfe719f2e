//! Capability Trait for Single-Axis Motor Controllers
//!
//! Hosts (motion-record adapters, CLIs, scan engines) talk to a driver only
//! through [`MotorAxis`]. The trait is the small capability surface a host
//! adapter implements its framework's entry points against; drivers never see
//! the host framework.
//!
//! # Contract
//!
//! - Every operation updates the axis status and then notifies subscribers,
//!   whether or not it succeeded.
//! - Failures are contained: they surface as status flags, a diagnostic log
//!   line, and an `Err` outcome. Nothing panics across this boundary.
//! - The host serialises calls per axis (poll and motion commands are never
//!   issued concurrently for the same axis). Drivers rely on that as a
//!   precondition and add no locking of their own beyond the transport mutex.

use crate::error::MotorResult;
use crate::status::AxisStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Velocity/acceleration profile for a motion command.
///
/// Values are in device units; drivers truncate to whatever integer
/// resolution the controller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveProfile {
    /// Base (start) velocity. Zero or negative means "leave unchanged".
    pub base_velocity: f64,
    /// Top (slew) velocity. Negative values are legal for reverse jogs.
    pub max_velocity: f64,
    /// Acceleration. Zero means "leave unchanged".
    pub acceleration: f64,
}

impl MoveProfile {
    /// Create a profile from base velocity, top velocity, and acceleration.
    pub fn new(base_velocity: f64, max_velocity: f64, acceleration: f64) -> Self {
        Self {
            base_velocity,
            max_velocity,
            acceleration,
        }
    }
}

/// Capability: Single-Axis Motion Control
///
/// Implemented by drivers for controllers that run exactly one axis.
#[async_trait]
pub trait MotorAxis: Send + Sync {
    /// Start an absolute (`relative == false`) or relative move.
    async fn move_to(&self, position: f64, relative: bool, profile: MoveProfile)
        -> MotorResult<()>;

    /// Start a constant-velocity move that runs until [`stop`](Self::stop).
    async fn move_velocity(&self, profile: MoveProfile) -> MotorResult<()>;

    /// Start a homing sequence towards the home switch.
    ///
    /// `forwards` selects the positive search direction.
    async fn home(&self, profile: MoveProfile, forwards: bool) -> MotorResult<()>;

    /// Decelerate to a stop. An `acceleration` of zero keeps the current ramp.
    async fn stop(&self, acceleration: f64) -> MotorResult<()>;

    /// Redefine the current position without moving.
    async fn set_position(&self, position: f64) -> MotorResult<()>;

    /// Run one poll cycle.
    ///
    /// Returns the moving flag on success, which the host scheduler uses to
    /// choose its next poll period.
    async fn poll(&self) -> MotorResult<bool>;

    /// Persist controller settings to nonvolatile memory.
    async fn save_to_nvm(&self) -> MotorResult<()>;

    /// Current status, including changes not yet published.
    fn status(&self) -> AxisStatus;

    /// Subscribe to published status snapshots.
    fn subscribe(&self) -> watch::Receiver<AxisStatus>;
}
