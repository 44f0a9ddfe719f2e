//! Connection, identification, and input resolution against a mock controller.

mod common;

use common::{config, FOUR_INPUTS, QUIET};
use motor_core::mock_serial;
use motor_core::{CommsState, MotorAxis, MotorError};
use motor_driver_lexium::{Framing, InputAssignments, LexiumController, Transport};

#[tokio::test]
async fn connect_identifies_and_resolves_inputs() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    assert_eq!(
        axis.controller().inputs(),
        InputAssignments {
            home: Some(1),
            positive_limit: Some(2),
            negative_limit: Some(3),
        }
    );

    let status = axis.status();
    assert!(status.has_encoder);
    assert!(status.gain_support);
    assert_eq!(status.comms, CommsState::Healthy);
    assert!(!status.problem);

    assert_eq!(axis.controller().transport().framing().await, Framing::normal());
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn encoder_disabled_clears_flags() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    let script = async {
        harness.expect_and_respond(b"PR VR\r", b"3.009\r\n").await;
        harness.expect_and_respond(b"PR EE\r", b"0\r\n").await;
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);
    let axis = axis.unwrap();

    assert!(!axis.status().has_encoder);
    assert!(!axis.status().gain_support);
}

#[tokio::test]
async fn identify_retries_transport_failures() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    // First two PR VR writes fail, the third gets through
    harness.fail_next_writes(2);
    let script = async {
        harness.expect_and_respond(b"PR VR\r", b"3.009\r\n").await;
        harness.expect_and_respond(b"PR EE\r", b"1\r\n").await;
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);
    let axis = axis.unwrap();

    let status = axis.status();
    assert!(status.has_encoder);
    // Only a successful poll clears the comms flag
    assert_eq!(status.comms, CommsState::CommsDegraded);
}

#[tokio::test]
async fn identify_retries_read_timeouts() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    let script = async {
        harness.expect_write(b"PR VR\r").await;
        harness.expect_and_respond(b"PR VR\r", b"3.009\r\n").await;
        harness.expect_and_respond(b"PR EE\r", b"1\r\n").await;
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);

    assert!(axis.unwrap().status().has_encoder);
}

#[tokio::test]
async fn identify_gives_up_after_three_attempts() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();
    let transport = Transport::new(port);

    harness.fail_next_writes(3);
    let script = async {
        // No fourth PR VR and no PR EE: the next thing on the wire is PR IS
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, transport), script);
    let axis = axis.unwrap();

    let status = axis.status();
    assert!(!status.has_encoder);
    assert_eq!(status.comms, CommsState::CommsDegraded);
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn short_version_fails_without_retry() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    let script = async {
        harness.expect_and_respond(b"PR VR\r", b"3\r\n").await;
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);
    let axis = axis.unwrap();

    let status = axis.status();
    assert!(status.problem);
    assert_eq!(status.comms, CommsState::CommsDegraded);
    assert!(!status.has_encoder);
}

#[tokio::test]
async fn configure_reports_short_version_as_invalid_response() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (result, ()) = tokio::join!(axis.configure(), async {
        harness.expect_and_respond(b"PR VR\r", b"\r\n").await;
    });

    assert!(matches!(result, Err(MotorError::InvalidResponse { .. })));
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn multidrop_prefix_on_every_command() {
    let mut cfg = config();
    cfg.device_name = "Ax".into();
    let (axis, mut harness) = common::connect(cfg, FOUR_INPUTS).await;

    let (result, ()) = tokio::join!(axis.stop(0.0), async {
        harness.expect_write(b"AxSL 0\r").await;
    });
    assert!(result.is_ok());
}

#[tokio::test]
async fn unreadable_input_settings_leave_roles_unassigned() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    let script = async {
        harness.expect_and_respond(b"PR VR\r", b"3.009\r\n").await;
        harness.expect_and_respond(b"PR EE\r", b"1\r\n").await;
        // Silent on PR IS
        harness.expect_write(b"PR IS\r").await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);
    let axis = axis.unwrap();

    assert_eq!(axis.controller().inputs(), InputAssignments::default());
    assert_eq!(axis.status().comms, CommsState::CommsDegraded);
    assert_eq!(axis.controller().transport().framing().await, Framing::normal());
}

#[tokio::test]
async fn stale_input_is_flushed_before_identification() {
    let (port, mut harness) = mock_serial::new();
    let cfg = config();

    harness.send_response(b"99\r\n").unwrap();
    let script = async {
        harness.expect_and_respond(b"PR VR\r", b"3.009\r\n").await;
        harness.expect_and_respond(b"PR EE\r", b"1\r\n").await;
        harness.expect_and_respond(b"PR IS\r", FOUR_INPUTS).await;
    };
    let (axis, ()) = tokio::join!(LexiumController::attach(&cfg, Transport::new(port)), script);

    assert!(!axis.unwrap().status().problem);
}
