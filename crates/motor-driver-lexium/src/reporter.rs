//! Device Error Reporter.
//!
//! After a primitive fails, the axis raises its problem flag and asks the
//! controller for the last fault code with `PR ER`. A nonzero code is logged
//! together with the caller's context message and its description.
//!
//! If `PR ER` itself fails the code is taken as 0, so a broken link never
//! produces a second error report on top of the first.

use crate::axis::LexiumAxis;
use crate::codec::{self, Command};
use crate::error_codes::DeviceErrorCode;
use tracing::{error, warn};

impl LexiumAxis {
    /// Raise the problem flag and log the controller's fault code.
    ///
    /// Returns the code read, or code 0 if it could not be read.
    pub async fn report(&self, context: &str) -> DeviceErrorCode {
        self.status.update(|s| s.problem = true);

        let code = match self.query(Command::ErrorQuery).await {
            Ok(response) => DeviceErrorCode(codec::parse_int(&response)),
            Err(e) => {
                warn!(motor = %self.motor_name(), error = %e, "Could not read error code");
                DeviceErrorCode::default()
            }
        };

        if !code.is_ok() {
            self.status.update(|s| s.last_error_code = Some(code.0));
            error!(
                motor = %self.motor_name(),
                code = code.0,
                description = code.description(),
                "{}",
                context
            );
        }

        code
    }
}
