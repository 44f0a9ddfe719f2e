//! Motion primitives: command sequences, first-failure-wins, and reporting.

mod common;

use common::{config, FOUR_INPUTS, QUIET};
use motor_core::{CommsState, MotorAxis, MotorError, MoveProfile};

#[tokio::test]
async fn absolute_move_sends_profile_then_target() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(500.0, 5000.0, 20000.0);

    let (result, ()) = tokio::join!(axis.move_to(1000.7, false, profile), async {
        harness.expect_write(b"VI=500\r").await;
        harness.expect_write(b"VM=5000\r").await;
        harness.expect_write(b"A=20000\r").await;
        harness.expect_write(b"MA 1000\r").await;
    });

    assert!(result.is_ok());
    assert!(!axis.status().problem);
}

#[tokio::test]
async fn relative_move_skips_unset_base_and_acceleration() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(0.0, 5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.move_to(-200.0, true, profile), async {
        harness.expect_write(b"VM=5000\r").await;
        harness.expect_write(b"MR -200\r").await;
    });

    assert!(result.is_ok());
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn jog_accepts_negative_top_velocity() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(1000.0, -5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.move_velocity(profile), async {
        harness.expect_write(b"VI=1000\r").await;
        harness.expect_write(b"VM=-5000\r").await;
        harness.expect_write(b"SL -5000\r").await;
    });

    assert!(result.is_ok());
}

#[tokio::test]
async fn first_failed_write_aborts_and_reports() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let mut rx = axis.subscribe();
    let profile = MoveProfile::new(0.0, 5000.0, 100.0);

    harness.fail_next_writes(1);
    let (result, ()) = tokio::join!(axis.move_to(10.0, false, profile), async {
        // VM= failed; A= and MA are never sent, only the error query
        harness.expect_and_respond(b"PR ER\r", b"24\r\n").await;
    });

    assert!(matches!(result, Err(MotorError::Transport(_))));
    harness.expect_no_write(QUIET).await;

    let status = axis.status();
    assert!(status.problem);
    assert_eq!(status.comms, CommsState::CommsDegraded);
    assert_eq!(status.last_error_code, Some(24));
    assert!(rx.has_changed().unwrap());
}

#[tokio::test]
async fn stop_with_and_without_deceleration() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (result, ()) = tokio::join!(axis.stop(0.0), async {
        harness.expect_write(b"SL 0\r").await;
    });
    assert!(result.is_ok());

    let (result, ()) = tokio::join!(axis.stop(3000.0), async {
        harness.expect_write(b"A=3000\r").await;
        harness.expect_write(b"SL 0\r").await;
    });
    assert!(result.is_ok());
}

#[tokio::test]
async fn home_forwards_substitutes_default_base_velocity() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(0.0, 5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.home(profile, true), async {
        harness.expect_and_respond(b"PR VI\r", b"0\r\n").await;
        harness.expect_write(b"VI=1000\r").await;
        harness.expect_write(b"VM=5000\r").await;
        harness.expect_write(b"HM 3\r").await;
    });

    assert!(result.is_ok());
}

#[tokio::test]
async fn home_keeps_configured_base_velocity() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(0.0, 5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.home(profile, false), async {
        harness.expect_and_respond(b"PR VI\r", b"400\r\n").await;
        harness.expect_write(b"VI=400\r").await;
        harness.expect_write(b"VM=5000\r").await;
        harness.expect_write(b"HM 1\r").await;
    });

    assert!(result.is_ok());
}

#[tokio::test]
async fn home_reverse_with_explicit_base() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(200.0, 5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.home(profile, false), async {
        harness.expect_write(b"VI=200\r").await;
        harness.expect_write(b"VM=5000\r").await;
        harness.expect_write(b"HM 1\r").await;
    });

    assert!(result.is_ok());
}

#[tokio::test]
async fn home_rejects_base_above_top_velocity() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let profile = MoveProfile::new(6000.0, 5000.0, 0.0);

    let (result, ()) = tokio::join!(axis.home(profile, true), async {
        harness.expect_and_respond(b"PR ER\r", b"0\r\n").await;
    });

    assert!(matches!(result, Err(MotorError::InvalidParameter(_))));
    assert!(axis.status().problem);
    // Rejected before the wire, so comms stay healthy
    assert_eq!(axis.status().comms, CommsState::Healthy);
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn set_position_writes_all_three_registers() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (result, ()) = tokio::join!(axis.set_position(51200.0), async {
        harness.expect_write(b"P=51200\r").await;
        harness.expect_write(b"C1=51200\r").await;
        harness.expect_write(b"C2=4000\r").await;
    });
    assert!(result.is_ok());

    let (result, ()) = tokio::join!(axis.set_position(1000.0), async {
        harness.expect_write(b"P=1000\r").await;
        harness.expect_write(b"C1=1000\r").await;
        harness.expect_write(b"C2=78\r").await;
    });
    assert!(result.is_ok());
}

#[tokio::test]
async fn set_position_ignores_leading_write_failures() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    harness.fail_next_writes(2);
    let (result, ()) = tokio::join!(axis.set_position(-1000.0), async {
        harness.expect_write(b"C2=-78\r").await;
    });

    assert!(result.is_ok());
    assert!(!axis.status().problem);
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn save_to_nvm_sends_save() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (result, ()) = tokio::join!(axis.save_to_nvm(), async {
        harness.expect_write(b"S\r").await;
    });
    assert!(result.is_ok());
}

#[tokio::test]
async fn save_to_nvm_parameter_only_accepts_one() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let mut rx = axis.subscribe();

    let rejected = axis.request_save_to_nvm(0).await;
    assert!(matches!(rejected, Err(MotorError::InvalidParameter(_))));
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();
    harness.expect_no_write(QUIET).await;

    let (accepted, ()) = tokio::join!(axis.request_save_to_nvm(1), async {
        harness.expect_write(b"S\r").await;
    });
    assert!(accepted.is_ok());
    assert!(rx.has_changed().unwrap());
}

#[tokio::test]
async fn failed_save_reports_device_error() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    harness.fail_next_writes(1);
    let (result, ()) = tokio::join!(axis.save_to_nvm(), async {
        harness.expect_and_respond(b"PR ER\r", b"73\r\n").await;
    });

    assert!(result.is_err());
    assert_eq!(axis.status().last_error_code, Some(73));
}
