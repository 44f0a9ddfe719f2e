//! Mock controller setup shared by the unit and integration suites.
//!
//! Enabled for this crate's own tests and by the `testing` feature.

#![allow(clippy::expect_used)]

use crate::axis::LexiumAxis;
use crate::controller::{LexiumConfig, LexiumController};
use crate::transport::Transport;
use motor_core::mock_serial::{self, MockDeviceHarness};
use std::time::Duration;

/// `PR IS` reply wiring home to I1 and the limits to I2 and I3.
pub const FOUR_INPUTS: &[u8] = b"IS = 1, 1, 1\r\nIS = 2, 2, 1\r\nIS = 3, 3, 1\r\nIS = 4, 0, 0\r\n";
/// `PR IS` reply with no switch inputs assigned.
pub const NO_SWITCHES: &[u8] = b"IS = 1, 0, 0\r\nIS = 2, 0, 0\r\n";

/// Long enough for the driver to have written anything it was going to.
pub const QUIET: Duration = Duration::from_millis(50);

/// Config for a mock port with short deadlines.
pub fn config() -> LexiumConfig {
    let mut config = LexiumConfig::new("M06", "/dev/ttyMOCK0");
    config.timeout_ms = 200;
    config.input_settings_timeout_ms = 50;
    config
}

/// Attach an axis to a mock controller that identifies as firmware 3.009
/// with an encoder and answers `PR IS` with `inputs`.
pub async fn connect(config: LexiumConfig, inputs: &[u8]) -> (LexiumAxis, MockDeviceHarness) {
    let (port, mut harness) = mock_serial::new();
    let prefix = config.device_name.clone();

    let script = async {
        harness
            .expect_and_respond(format!("{prefix}PR VR\r").as_bytes(), b"3.009\r\n")
            .await;
        harness
            .expect_and_respond(format!("{prefix}PR EE\r").as_bytes(), b"1\r\n")
            .await;
        harness
            .expect_and_respond(format!("{prefix}PR IS\r").as_bytes(), inputs)
            .await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&config, Transport::new(port)), script);

    (axis.expect("attach failed"), harness)
}

/// Answer a full poll: position, moving flag, then the three switch inputs.
pub async fn answer_poll(
    harness: &mut MockDeviceHarness,
    position: &str,
    moving: &str,
    switches: [&str; 3],
) {
    harness
        .expect_and_respond(b"PR P\r", format!("{position}\r\n").as_bytes())
        .await;
    harness
        .expect_and_respond(b"PR MV\r", format!("{moving}\r\n").as_bytes())
        .await;
    for (input, value) in (1..=3).zip(switches) {
        harness
            .expect_and_respond(
                format!("PR I{input}\r").as_bytes(),
                format!("{value}\r\n").as_bytes(),
            )
            .await;
    }
}
