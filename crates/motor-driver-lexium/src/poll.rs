//! Poll Cycle.
//!
//! Each tick runs these queries in order, stopping at the first failure:
//!
//! | Step | Command       | Updates                          |
//! |------|---------------|----------------------------------|
//! | 1    | `PR P`        | position, encoder position       |
//! | 2    | `PR MV`       | moving, done                     |
//! | 3    | `PR I<home>`  | at home (if a home input exists) |
//! | 4    | `PR I<pos>`   | high limit (if assigned)         |
//! | 5    | `PR I<neg>`   | low limit (if assigned)          |
//!
//! Fields are written as soon as their step succeeds. A tick that fails at a
//! step leaves that step's field and every later one at last tick's value, and
//! moves the axis to `CommsDegraded`. A tick where every step succeeds moves
//! it back to `Healthy` and clears the problem flag.

use crate::axis::LexiumAxis;
use crate::codec::{self, Command};
use motor_core::error::{MotorResult, TransportError};
use motor_core::status::CommsState;
use tracing::trace;

impl LexiumAxis {
    /// Run one poll tick and publish the result.
    ///
    /// Returns the moving flag on success.
    pub async fn poll_cycle(&self) -> MotorResult<bool> {
        let result = self.read_axis_state().await;

        match &result {
            Ok(_) => self.status.update(|s| {
                s.comms = CommsState::Healthy;
                s.problem = false;
            }),
            Err(_) => {
                self.report("Error polling motor").await;
            }
        }

        self.status.notify();
        Ok(result?)
    }

    async fn read_axis_state(&self) -> Result<bool, TransportError> {
        let position = codec::parse_float(&self.query(Command::PositionQuery).await?);
        self.status.update(|s| {
            s.position = position;
            s.encoder_position = position;
        });

        let moving = codec::parse_int(&self.query(Command::MovingQuery).await?) == 1;
        self.status.update(|s| {
            s.moving = moving;
            s.done = !moving;
        });

        let inputs = self.controller.inputs();

        if let Some(input) = inputs.home {
            let asserted = self.read_input(input).await?;
            self.status.update(|s| s.at_home = asserted);
        }
        if let Some(input) = inputs.positive_limit {
            let asserted = self.read_input(input).await?;
            self.status.update(|s| s.high_limit = asserted);
        }
        if let Some(input) = inputs.negative_limit {
            let asserted = self.read_input(input).await?;
            self.status.update(|s| s.low_limit = asserted);
        }

        trace!(motor = %self.motor_name(), position, moving, "Poll");
        Ok(moving)
    }

    async fn read_input(&self, input: u8) -> Result<bool, TransportError> {
        let response = self.query(Command::InputQuery(input)).await?;
        Ok(codec::parse_int(&response) != 0)
    }
}
