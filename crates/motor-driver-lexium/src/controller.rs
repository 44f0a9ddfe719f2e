//! Controller session: configuration, command framing, and startup.
//!
//! A [`LexiumController`] owns the transport and the resolved input roles for
//! one physical controller. Lexium MDrives carry exactly one axis, so every
//! session is paired with one [`LexiumAxis`]. The axis holds an `Arc` to its
//! session; the session never refers back to the axis.
//!
//! # Startup sequence
//!
//! [`LexiumController::connect`] performs the work the host expects before
//! polling starts:
//!
//! 1. open the link (the only fatal step)
//! 2. discard stale input
//! 3. identify the controller and read its encoder flag
//! 4. resolve the home and limit switch inputs from `PR IS`
//!
//! Failures in steps 3 and 4 are logged and reflected in the axis status, and
//! the axis is returned anyway so the poll cycle can recover once the
//! controller starts answering.

use crate::axis::LexiumAxis;
use crate::codec::{self, Command};
use crate::inputs::InputAssignments;
use crate::transport::{Response, Transport, DEFAULT_TIMEOUT, MAX_RESPONSE_LEN};
use motor_core::driver::PollPeriods;
use motor_core::error::{MotorError, MotorResult, TransportError};
use motor_core::serial::ConnectionTarget;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest motor port name or device name accepted.
pub const MAX_NAME_LEN: usize = 9;

/// Quiet period used when discarding stale input after connecting.
const STARTUP_DRAIN: Duration = Duration::from_millis(50);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one Lexium controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiumConfig {
    /// Name used for this controller in logs and by the host
    pub motor_port_name: String,
    /// Serial device path, `host:port`, or `tcp://host:port`
    pub target: String,
    /// Serial baud rate (ignored for TCP targets)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Multidrop (party mode) device name prefixed to every command
    #[serde(default)]
    pub device_name: String,
    /// Poll period while moving, in milliseconds
    pub moving_poll_ms: u64,
    /// Poll period while idle, in milliseconds
    pub idle_poll_ms: u64,
    /// Per-exchange deadline, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Deadline for the multi-line `PR IS` read, in milliseconds
    #[serde(default = "default_input_settings_timeout_ms")]
    pub input_settings_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_input_settings_timeout_ms() -> u64 {
    100
}

impl LexiumConfig {
    /// Minimal configuration for `target` with default timing.
    pub fn new(motor_port_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            motor_port_name: motor_port_name.into(),
            target: target.into(),
            baud_rate: default_baud_rate(),
            device_name: String::new(),
            moving_poll_ms: 100,
            idle_poll_ms: 1000,
            timeout_ms: default_timeout_ms(),
            input_settings_timeout_ms: default_input_settings_timeout_ms(),
        }
    }

    /// Check values without touching hardware.
    pub fn validate(&self) -> MotorResult<()> {
        if self.motor_port_name.is_empty() {
            return Err(MotorError::Configuration(
                "motor_port_name must not be empty".into(),
            ));
        }
        if self.motor_port_name.len() > MAX_NAME_LEN {
            return Err(MotorError::Configuration(format!(
                "motor_port_name '{}' exceeds {} characters",
                self.motor_port_name, MAX_NAME_LEN
            )));
        }
        if self.device_name.len() > MAX_NAME_LEN {
            return Err(MotorError::Configuration(format!(
                "device_name '{}' exceeds {} characters",
                self.device_name, MAX_NAME_LEN
            )));
        }
        if !self.device_name.is_ascii() {
            return Err(MotorError::Configuration(
                "device_name must be ASCII".into(),
            ));
        }
        if self.moving_poll_ms == 0 || self.idle_poll_ms == 0 {
            return Err(MotorError::Configuration(
                "poll periods must be greater than zero".into(),
            ));
        }
        if self.timeout_ms == 0 || self.input_settings_timeout_ms == 0 {
            return Err(MotorError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(MotorError::Configuration(
                "baud_rate must be greater than zero".into(),
            ));
        }
        self.connection_target()?;
        Ok(())
    }

    /// Parsed connection target.
    pub fn connection_target(&self) -> MotorResult<ConnectionTarget> {
        self.target
            .parse()
            .map_err(|e: TransportError| MotorError::Configuration(e.to_string()))
    }

    /// Scheduler periods requested for this controller.
    pub fn poll_periods(&self) -> PollPeriods {
        PollPeriods::from_millis(self.moving_poll_ms, self.idle_poll_ms)
    }

    /// Per-exchange deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Deadline for the `PR IS` read.
    pub fn input_settings_timeout(&self) -> Duration {
        Duration::from_millis(self.input_settings_timeout_ms)
    }
}

// =============================================================================
// LexiumController
// =============================================================================

/// Session with one Lexium controller.
pub struct LexiumController {
    motor_name: String,
    device_name: String,
    transport: Transport,
    timeout: Duration,
    input_settings_timeout: Duration,
    inputs: RwLock<InputAssignments>,
}

impl LexiumController {
    /// Open the configured link and bring the axis up.
    ///
    /// # Errors
    ///
    /// Fails only if the configuration is invalid or the link cannot be
    /// opened. Identification and input resolution failures leave the axis
    /// flagged but still usable.
    pub async fn connect(config: &LexiumConfig) -> MotorResult<LexiumAxis> {
        config.validate()?;
        let target = config.connection_target()?;
        let transport = Transport::open(&target, config.baud_rate, &config.motor_port_name).await?;
        info!(motor = %config.motor_port_name, %target, "Connected to Lexium controller");
        Self::attach(config, transport).await
    }

    /// Bring the axis up over an already-open transport.
    pub async fn attach(config: &LexiumConfig, transport: Transport) -> MotorResult<LexiumAxis> {
        config.validate()?;

        let dropped = transport.drain_input(STARTUP_DRAIN).await;
        if dropped > 0 {
            debug!(motor = %config.motor_port_name, bytes = dropped, "Flushed stale input");
        }

        let controller = Arc::new(Self {
            motor_name: config.motor_port_name.clone(),
            device_name: config.device_name.clone(),
            transport,
            timeout: config.timeout(),
            input_settings_timeout: config.input_settings_timeout(),
            inputs: RwLock::new(InputAssignments::default()),
        });

        let axis = LexiumAxis::new(controller.clone());
        if axis.configure().await.is_err() {
            warn!(motor = %controller.motor_name, "Controller configuration failed, continuing");
        }

        if let Err(e) = controller.read_home_and_limit_config().await {
            warn!(motor = %controller.motor_name, error = %e, "Could not read input settings");
            axis.mark_comms_degraded();
            axis.status_publisher().notify();
        }

        Ok(axis)
    }

    /// Name used in logs.
    pub fn motor_name(&self) -> &str {
        &self.motor_name
    }

    /// Resolved home and limit inputs.
    pub fn inputs(&self) -> InputAssignments {
        *self.inputs.read()
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send a command without reading a response.
    pub async fn write_controller(&self, command: Command) -> Result<(), TransportError> {
        debug_assert!(!command.expects_response(), "{command} answers with a line");
        let framed = codec::prepend_device_address(&self.device_name, &command.to_string());
        debug!(motor = %self.motor_name, command = %framed, "Write");
        self.transport.write(&framed, self.timeout).await
    }

    /// Send a query and return the response text.
    pub async fn write_read_controller(&self, command: Command) -> Result<String, TransportError> {
        debug_assert!(command.expects_response(), "{command} has no response line");
        let framed = codec::prepend_device_address(&self.device_name, &command.to_string());
        let response = self
            .transport
            .write_read(&framed, MAX_RESPONSE_LEN, self.timeout)
            .await?;
        debug!(motor = %self.motor_name, command = %framed, response = %response.text, "Write/read");
        Ok(response.text)
    }

    /// Read `PR IS` and record which inputs are wired to home and limits.
    ///
    /// Uses raw framing with the short input-settings deadline. Roles that
    /// do not appear in the response keep their previous assignment.
    pub async fn read_home_and_limit_config(&self) -> Result<InputAssignments, TransportError> {
        let framed =
            codec::prepend_device_address(&self.device_name, &Command::InputSettingsQuery.to_string());
        let Response { text, termination } = self
            .transport
            .write_read_raw(&framed, MAX_RESPONSE_LEN, self.input_settings_timeout)
            .await?;
        debug!(motor = %self.motor_name, command = %framed, response = ?text, ?termination, "Write/read raw");

        let settings = crate::inputs::parse_input_settings(&text);
        let assignments = {
            let mut inputs = self.inputs.write();
            inputs.apply(&settings);
            *inputs
        };

        info!(
            motor = %self.motor_name,
            home = ?assignments.home,
            positive_limit = ?assignments.positive_limit,
            negative_limit = ?assignments.negative_limit,
            "Resolved switch inputs"
        );
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_from_toml() {
        let config: LexiumConfig = toml::from_str(
            r#"
            motor_port_name = "M06"
            target = "ts-b34-nw08:2101"
            moving_poll_ms = 100
            idle_poll_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.device_name, "");
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.input_settings_timeout(), Duration::from_millis(100));
        assert_eq!(
            config.connection_target().unwrap(),
            ConnectionTarget::Tcp("ts-b34-nw08:2101".into())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_long_names() {
        let mut config = LexiumConfig::new("M06", "/dev/ttyUSB0");
        config.device_name = "ABCDEFGHIJ".into();
        assert!(matches!(
            config.validate(),
            Err(MotorError::Configuration(_))
        ));

        let config = LexiumConfig::new("MOTORPORT10", "/dev/ttyUSB0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_zero_periods_and_empty_target() {
        let mut config = LexiumConfig::new("M06", "/dev/ttyUSB0");
        config.idle_poll_ms = 0;
        assert!(config.validate().is_err());

        let config = LexiumConfig::new("M06", "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn poll_periods_follow_config() {
        let config = LexiumConfig::new("M06", "/dev/ttyUSB0");
        assert_eq!(config.poll_periods(), PollPeriods::from_millis(100, 1000));
    }

    #[tokio::test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "answers with a line")]
    async fn queries_are_not_sent_write_only() {
        let (axis, _harness) =
            crate::test_support::connect(crate::test_support::config(), crate::test_support::FOUR_INPUTS)
                .await;
        let _ = axis.controller().write_controller(Command::PositionQuery).await;
    }

    #[tokio::test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "has no response line")]
    async fn set_commands_do_not_wait_for_a_reply() {
        let (axis, _harness) =
            crate::test_support::connect(crate::test_support::config(), crate::test_support::FOUR_INPUTS)
                .await;
        let _ = axis.controller().write_read_controller(Command::SaveToNvm).await;
    }
}
