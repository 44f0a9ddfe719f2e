//! `motor-core`
//!
//! Core traits and types shared by single-axis motor controller drivers.
//!
//! ## Key Types
//!
//! - [`MotorAxis`]: Capability trait a host drives an axis through
//! - [`AxisStatus`] / [`StatusPublisher`]: Status snapshot plus change notification
//! - [`MotorError`] / [`TransportError`]: Error hierarchy
//! - [`DriverFactory`]: Build a driver from a TOML table
//! - [`AxisPoller`]: Two-rate background poll scheduler
//!
//! Enable the `testing` feature for the scripted [`mock_serial`] link.

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod poller;
pub mod serial;
pub mod status;

#[cfg(feature = "testing")]
pub mod mock_serial;

pub use capabilities::{MotorAxis, MoveProfile};
pub use driver::{DeviceComponents, DriverFactory, PollPeriods};
pub use error::{MotorError, MotorResult, TransportError};
pub use poller::AxisPoller;
pub use serial::{ConnectionTarget, DynSerial, SerialPortIO};
pub use status::{AxisStatus, CommsState, StatusPublisher};
