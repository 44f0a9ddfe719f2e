//! Poll cycle ordering, staleness on partial failure, and recovery.

mod common;

use common::{answer_poll, config, FOUR_INPUTS, NO_SWITCHES, QUIET};
use motor_core::{CommsState, MotorAxis};

#[tokio::test]
async fn full_poll_refreshes_every_field() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;
    let mut rx = axis.subscribe();

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "1200", "1", ["1", "0", "0"]));

    assert!(moving.unwrap());
    let status = axis.status();
    assert_eq!(status.position, 1200.0);
    assert_eq!(status.encoder_position, 1200.0);
    assert!(status.moving);
    assert!(!status.done);
    assert!(status.at_home);
    assert!(!status.high_limit);
    assert!(!status.low_limit);
    assert_eq!(status.comms, CommsState::Healthy);
    assert!(!status.problem);

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().position, 1200.0);
}

#[tokio::test]
async fn idle_axis_reports_done() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "-50", "0", ["0", "1", "1"]));

    assert!(!moving.unwrap());
    let status = axis.status();
    assert_eq!(status.position, -50.0);
    assert!(!status.moving);
    assert!(status.done);
    assert!(status.high_limit);
    assert!(status.low_limit);
}

#[tokio::test]
async fn moving_flag_only_true_for_one() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "0", "2", ["0", "0", "0"]));

    assert!(!moving.unwrap());
    assert!(axis.status().done);
}

#[tokio::test]
async fn failure_midway_leaves_later_fields_stale() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (first, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "100", "1", ["1", "1", "1"]));
    assert!(first.is_ok());

    // Position answers, moving flag times out, then the reporter asks for the error code
    let (second, ()) = tokio::join!(axis.poll(), async {
        harness.expect_and_respond(b"PR P\r", b"200\r\n").await;
        harness.expect_write(b"PR MV\r").await;
        harness.expect_and_respond(b"PR ER\r", b"0\r\n").await;
    });

    assert!(second.unwrap_err().is_transport());
    let status = axis.status();
    assert_eq!(status.position, 200.0);
    assert_eq!(status.encoder_position, 200.0);
    assert!(status.moving);
    assert!(!status.done);
    assert!(status.at_home);
    assert!(status.high_limit);
    assert!(status.low_limit);
    assert_eq!(status.comms, CommsState::CommsDegraded);
    assert!(status.comms_error());
    assert!(status.problem);

    // Nothing else is queried this tick
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn failure_at_first_step_changes_nothing() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (first, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "300", "0", ["0", "0", "1"]));
    assert!(first.is_ok());
    let before = axis.status();

    harness.fail_next_writes(1);
    let (second, ()) = tokio::join!(axis.poll(), async {
        harness.expect_and_respond(b"PR ER\r", b"0\r\n").await;
    });

    assert!(second.is_err());
    let after = axis.status();
    assert_eq!(after.position, before.position);
    assert_eq!(after.done, before.done);
    assert_eq!(after.low_limit, before.low_limit);
    assert_eq!(after.comms, CommsState::CommsDegraded);
}

#[tokio::test]
async fn successful_poll_recovers_from_degraded() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    harness.fail_next_writes(1);
    let (failed, ()) = tokio::join!(axis.poll(), async {
        harness.expect_and_respond(b"PR ER\r", b"0\r\n").await;
    });
    assert!(failed.is_err());
    assert!(axis.status().comms_error());
    assert!(axis.status().problem);

    let (recovered, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "5", "0", ["0", "0", "0"]));
    assert!(recovered.is_ok());
    let status = axis.status();
    assert_eq!(status.comms, CommsState::Healthy);
    assert!(!status.problem);
}

#[tokio::test]
async fn unassigned_inputs_are_not_queried() {
    let (axis, mut harness) = common::connect(config(), NO_SWITCHES).await;

    let (moving, ()) = tokio::join!(axis.poll(), async {
        harness.expect_and_respond(b"PR P\r", b"10\r\n").await;
        harness.expect_and_respond(b"PR MV\r", b"0\r\n").await;
    });

    assert!(!moving.unwrap());
    harness.expect_no_write(QUIET).await;
}

#[tokio::test]
async fn non_numeric_responses_parse_as_zero() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "?", "", ["x", "x", "x"]));

    assert!(!moving.unwrap());
    let status = axis.status();
    assert_eq!(status.position, 0.0);
    assert!(!status.at_home);
    assert_eq!(status.comms, CommsState::Healthy);
}

#[tokio::test]
async fn late_position_reply_does_not_shift_later_polls() {
    let (axis, mut harness) = common::connect(config(), FOUR_INPUTS).await;

    // Position query times out, then the reporter asks for the error code
    let (failed, ()) = tokio::join!(axis.poll(), async {
        harness.expect_write(b"PR P\r").await;
        harness.expect_and_respond(b"PR ER\r", b"0\r\n").await;
    });
    assert!(failed.unwrap_err().is_transport());

    // The controller finally answers the timed-out query
    harness.send_response(b"777\r\n").unwrap();

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "100", "1", ["0", "0", "0"]));
    assert!(moving.unwrap());
    let status = axis.status();
    assert_eq!(status.position, 100.0);
    assert!(status.moving);
    assert_eq!(status.comms, CommsState::Healthy);

    let (moving, ()) = tokio::join!(axis.poll(), answer_poll(&mut harness, "200", "0", ["0", "0", "0"]));
    assert!(!moving.unwrap());
    assert_eq!(axis.status().position, 200.0);
}
