//! Axis Controller: motion primitives for the single Lexium axis.
//!
//! Every primitive follows the same shape:
//!
//! 1. compute device-unit values
//! 2. issue preparatory writes (velocities, acceleration), stopping at the
//!    first failure
//! 3. issue the action command
//! 4. on failure, run the device error reporter with a primitive-specific
//!    context message
//! 5. publish the axis status, success or not
//!
//! Any transport failure also raises the communications-error flag. Only a
//! fully successful poll cycle clears it again.
//!
//! Calls for one axis must not overlap. The host scheduler serialises poll
//! and motion calls per axis, and nothing here adds further locking.

use crate::codec::{self, Command, HomeDirection};
use crate::controller::LexiumController;
use async_trait::async_trait;
use motor_core::capabilities::{MotorAxis, MoveProfile};
use motor_core::error::{MotorError, MotorResult, TransportError};
use motor_core::status::{AxisStatus, CommsState, StatusPublisher};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Attempts at the version query before giving up.
pub const IDENTIFY_ATTEMPTS: u32 = 3;

/// Shortest acceptable `PR VR` response.
pub const MIN_VERSION_LEN: usize = 2;

/// Base velocity used for homing when the controller reports none.
pub const DEFAULT_HOME_BASE_VELOCITY: f64 = 1000.0;

/// The one axis of a Lexium controller.
pub struct LexiumAxis {
    pub(crate) controller: Arc<LexiumController>,
    pub(crate) status: StatusPublisher,
}

impl LexiumAxis {
    pub(crate) fn new(controller: Arc<LexiumController>) -> Self {
        debug!(motor = %controller.motor_name(), "Create axis");
        Self {
            controller,
            status: StatusPublisher::new(),
        }
    }

    /// Controller session this axis talks through.
    pub fn controller(&self) -> &LexiumController {
        &self.controller
    }

    pub(crate) fn motor_name(&self) -> &str {
        self.controller.motor_name()
    }

    pub(crate) fn status_publisher(&self) -> &StatusPublisher {
        &self.status
    }

    pub(crate) fn mark_comms_degraded(&self) {
        self.status.update(|s| s.comms = CommsState::CommsDegraded);
    }

    // =========================================================================
    // Wire helpers
    // =========================================================================

    pub(crate) async fn write(&self, command: Command) -> Result<(), TransportError> {
        let result = self.controller.write_controller(command).await;
        if result.is_err() {
            self.mark_comms_degraded();
        }
        result
    }

    pub(crate) async fn query(&self, command: Command) -> Result<String, TransportError> {
        let result = self.controller.write_read_controller(command).await;
        if result.is_err() {
            self.mark_comms_degraded();
        }
        result
    }

    /// Report a failed primitive, then publish status either way.
    async fn finish(&self, result: MotorResult<()>, context: &str) -> MotorResult<()> {
        if let Err(e) = &result {
            warn!(motor = %self.motor_name(), error = %e, "{}", context);
            self.report(context).await;
        }
        self.status.notify();
        result
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Identify the controller and read its encoder capability.
    ///
    /// The version query is retried on transport failure only. A version
    /// string shorter than two characters fails immediately and raises both
    /// the problem and communications-error flags.
    #[instrument(skip(self), fields(motor = %self.motor_name()))]
    pub async fn configure(&self) -> MotorResult<()> {
        let result = self.identify_and_detect_encoder().await;
        if let Err(e) = &result {
            error!(error = %e, "Controller configuration failed");
        }
        self.status.notify();
        result
    }

    async fn identify_and_detect_encoder(&self) -> MotorResult<()> {
        self.identify().await?;

        let enabled = codec::parse_int(&self.query(Command::EncoderQuery).await?) != 0;
        self.status.update(|s| {
            s.has_encoder = enabled;
            s.gain_support = enabled;
        });
        debug!(has_encoder = enabled, gain_support = enabled, "Encoder flags");
        Ok(())
    }

    async fn identify(&self) -> MotorResult<String> {
        let mut attempt = 1;
        loop {
            match self.query(Command::VersionQuery).await {
                Ok(version) if version.len() < MIN_VERSION_LEN => {
                    error!(%version, "Version inquiry returned a short response");
                    self.status.update(|s| {
                        s.problem = true;
                        s.comms = CommsState::CommsDegraded;
                    });
                    return Err(MotorError::InvalidResponse {
                        command: Command::VersionQuery.to_string(),
                        response: version,
                    });
                }
                Ok(version) => {
                    info!(%version, "Controller identified");
                    return Ok(version);
                }
                Err(e) if attempt < IDENTIFY_ATTEMPTS => {
                    warn!(attempt, error = %e, "Version inquiry failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Version inquiry failed");
                    return Err(e.into());
                }
            }
        }
    }

    // =========================================================================
    // Primitive bodies
    // =========================================================================

    /// Write base velocity, top velocity, and acceleration.
    ///
    /// Base velocity is only sent when positive and acceleration only when
    /// nonzero. Base is not checked against top velocity here; reverse jogs
    /// carry a negative top velocity.
    async fn apply_move_parameters(&self, profile: &MoveProfile) -> Result<(), TransportError> {
        if profile.base_velocity > 0.0 {
            self.write(Command::SetBaseVelocity(codec::device_units(profile.base_velocity)))
                .await?;
        }
        self.write(Command::SetMaxVelocity(codec::device_units(profile.max_velocity)))
            .await?;
        if profile.acceleration != 0.0 {
            self.write(Command::SetAcceleration(codec::device_units(profile.acceleration)))
                .await?;
        }
        Ok(())
    }

    async fn start_move(&self, position: f64, relative: bool, profile: MoveProfile) -> MotorResult<()> {
        debug!(
            motor = %self.motor_name(),
            base = profile.base_velocity,
            velocity = profile.max_velocity,
            acceleration = profile.acceleration,
            position,
            relative,
            "Move"
        );
        self.apply_move_parameters(&profile).await?;

        let target = codec::device_units(position);
        let command = if relative {
            Command::MoveRelative(target)
        } else {
            Command::MoveAbsolute(target)
        };
        self.write(command).await?;
        Ok(())
    }

    async fn start_jog(&self, profile: MoveProfile) -> MotorResult<()> {
        self.apply_move_parameters(&profile).await?;
        self.write(Command::Slew(codec::device_units(profile.max_velocity)))
            .await?;
        Ok(())
    }

    async fn start_home(&self, mut profile: MoveProfile, forwards: bool) -> MotorResult<()> {
        if profile.base_velocity > 0.0 {
            if profile.base_velocity > profile.max_velocity {
                return Err(MotorError::InvalidParameter(format!(
                    "base velocity {} cannot be greater than max velocity {}",
                    profile.base_velocity, profile.max_velocity
                )));
            }
        } else {
            // Homing needs a nonzero base velocity. The substitute is written
            // to the controller with VI= below and stays in effect afterwards.
            let configured = codec::parse_float(&self.query(Command::BaseVelocityQuery).await?);
            profile.base_velocity = if configured == 0.0 {
                DEFAULT_HOME_BASE_VELOCITY
            } else {
                configured
            };
        }

        self.apply_move_parameters(&profile).await?;

        let direction = HomeDirection::from_forwards(forwards);
        debug!(
            motor = %self.motor_name(),
            base = profile.base_velocity,
            velocity = profile.max_velocity,
            acceleration = profile.acceleration,
            forwards,
            "Home"
        );
        self.write(Command::Home(direction)).await?;
        Ok(())
    }

    async fn halt(&self, acceleration: f64) -> MotorResult<()> {
        if acceleration != 0.0 {
            self.write(Command::SetAcceleration(codec::device_units(acceleration)))
                .await?;
        }
        self.write(Command::STOP).await?;
        Ok(())
    }

    /// `P=`, `C1=`, `C2=` are always all sent; only the `C2=` outcome counts.
    async fn redefine_position(&self, position: f64) -> MotorResult<()> {
        let counts = codec::device_units(position);

        if let Err(e) = self.write(Command::SetPosition(counts)).await {
            debug!(motor = %self.motor_name(), error = %e, "P= write failed");
        }
        if let Err(e) = self.write(Command::SetCounter1(counts)).await {
            debug!(motor = %self.motor_name(), error = %e, "C1= write failed");
        }
        self.write(Command::SetCounter2(codec::counter2_for_position(counts)))
            .await?;
        Ok(())
    }

    async fn write_nvm(&self) -> MotorResult<()> {
        self.write(Command::SaveToNvm).await?;
        info!(motor = %self.motor_name(), "Saved to NVM");
        Ok(())
    }

    // =========================================================================
    // Host parameter handlers
    // =========================================================================

    /// Handle a write to the save-to-NVM parameter.
    ///
    /// Only the value 1 saves. Any other value is logged and rejected without
    /// touching the controller. Status is published either way.
    pub async fn request_save_to_nvm(&self, value: i32) -> MotorResult<()> {
        if value == 1 {
            let result = self.save_to_nvm().await;
            if result.is_err() {
                error!(motor = %self.motor_name(), "Error saving to NVM");
            }
            return result;
        }

        error!(motor = %self.motor_name(), value, "Write 1 to save to NVM");
        self.status.notify();
        Err(MotorError::InvalidParameter(format!(
            "save to NVM expects 1, got {}",
            value
        )))
    }
}

#[async_trait]
impl MotorAxis for LexiumAxis {
    async fn move_to(&self, position: f64, relative: bool, profile: MoveProfile) -> MotorResult<()> {
        let result = self.start_move(position, relative, profile).await;
        self.finish(result, "Error moving motor").await
    }

    async fn move_velocity(&self, profile: MoveProfile) -> MotorResult<()> {
        let result = self.start_jog(profile).await;
        self.finish(result, "Error jogging motor").await
    }

    async fn home(&self, profile: MoveProfile, forwards: bool) -> MotorResult<()> {
        let result = self.start_home(profile, forwards).await;
        self.finish(result, "Error homing motor").await
    }

    async fn stop(&self, acceleration: f64) -> MotorResult<()> {
        let result = self.halt(acceleration).await;
        self.finish(result, "Error stopping motor").await
    }

    async fn set_position(&self, position: f64) -> MotorResult<()> {
        let result = self.redefine_position(position).await;
        self.finish(result, "Error setting motor position").await
    }

    async fn poll(&self) -> MotorResult<bool> {
        self.poll_cycle().await
    }

    async fn save_to_nvm(&self) -> MotorResult<()> {
        let result = self.write_nvm().await;
        self.finish(result, "Error saving to NVM").await
    }

    fn status(&self) -> AxisStatus {
        self.status.snapshot()
    }

    fn subscribe(&self) -> watch::Receiver<AxisStatus> {
        self.status.subscribe()
    }
}
