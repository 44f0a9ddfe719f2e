//! Schneider Electric / IMS Lexium MDrive driver.
//!
//! Lexium MDrives are single-axis integrated stepper controllers programmed in
//! MCode over RS-232/RS-422 or Ethernet. This crate implements the
//! [`MotorAxis`](motor_core::MotorAxis) capability for them.
//!
//! Protocol overview:
//! - Format: ASCII commands terminated by `\r`, responses terminated by `\r\n`
//! - Baud: 9600 default, 8N1, no flow control
//! - Party mode: an optional device name is prefixed to every command
//! - Example: `PR P` returns the position counter, `MA 51200` moves there
//!
//! Enable the `testing` feature for `test_support`, which scripts a mock
//! controller through identification and polls.
//!
//! # Usage
//!
//! ```rust,ignore
//! use motor_driver_lexium::{LexiumConfig, LexiumController};
//! use motor_core::{AxisPoller, MotorAxis, MoveProfile};
//! use std::sync::Arc;
//!
//! let config = LexiumConfig::new("M06", "/dev/ttyUSB0");
//! let axis = Arc::new(LexiumController::connect(&config).await?);
//! let poller = AxisPoller::spawn(axis.clone(), config.poll_periods());
//!
//! let profile = MoveProfile::new(1000.0, 20000.0, 50000.0);
//! poller
//!     .command(|axis| async move { axis.move_to(51200.0, false, profile).await })
//!     .await?;
//! ```

pub mod axis;
pub mod codec;
pub mod controller;
pub mod error_codes;
pub mod factory;
pub mod inputs;
pub mod poll;
pub mod reporter;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use axis::LexiumAxis;
pub use controller::{LexiumConfig, LexiumController};
pub use error_codes::DeviceErrorCode;
pub use factory::LexiumFactory;
pub use inputs::InputAssignments;
pub use transport::{Framing, Response, Termination, Transport};
