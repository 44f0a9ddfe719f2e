//! Driver Factory and Component Types
//!
//! Drivers implement [`DriverFactory`] so a host can build them from a TOML
//! table without knowing the concrete driver type.
//!
//! # Example: Implementing a Driver Factory
//!
//! ```rust,ignore
//! use motor_core::driver::{DeviceComponents, DriverFactory, PollPeriods};
//! use futures::future::BoxFuture;
//! use std::sync::Arc;
//!
//! pub struct MyFactory;
//!
//! impl DriverFactory for MyFactory {
//!     fn driver_type(&self) -> &'static str { "my_motor" }
//!     fn name(&self) -> &'static str { "My Motor Controller" }
//!
//!     fn validate(&self, config: &toml::Value) -> anyhow::Result<()> {
//!         let _: MyConfig = config.clone().try_into()?;
//!         Ok(())
//!     }
//!
//!     fn build(&self, config: toml::Value) -> BoxFuture<'static, anyhow::Result<DeviceComponents>> {
//!         Box::pin(async move {
//!             let cfg: MyConfig = config.try_into()?;
//!             let axis = Arc::new(MyAxis::connect(&cfg).await?);
//!             Ok(DeviceComponents::new(axis, cfg.poll_periods()))
//!         })
//!     }
//! }
//! ```

use crate::capabilities::MotorAxis;
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// The two scheduler rates a driver asks its host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPeriods {
    /// Period while the axis reports motion
    pub moving: Duration,
    /// Period while the axis is idle
    pub idle: Duration,
}

impl PollPeriods {
    /// Build from millisecond values.
    pub fn from_millis(moving_ms: u64, idle_ms: u64) -> Self {
        Self {
            moving: Duration::from_millis(moving_ms),
            idle: Duration::from_millis(idle_ms),
        }
    }

    /// Period to wait after a poll that reported `moving`.
    pub fn for_moving(&self, moving: bool) -> Duration {
        if moving {
            self.moving
        } else {
            self.idle
        }
    }
}

/// What a factory hands back to the host.
pub struct DeviceComponents {
    /// The axis capability
    pub axis: Arc<dyn MotorAxis>,
    /// Poll rates requested by the driver configuration
    pub poll_periods: PollPeriods,
}

impl DeviceComponents {
    /// Bundle an axis with its poll rates.
    pub fn new(axis: Arc<dyn MotorAxis>, poll_periods: PollPeriods) -> Self {
        Self { axis, poll_periods }
    }
}

/// Factory for building a driver from configuration.
pub trait DriverFactory: Send + Sync {
    /// Short identifier used in configuration files (e.g. `"lexium"`).
    fn driver_type(&self) -> &'static str;

    /// Human-readable driver name.
    fn name(&self) -> &'static str;

    /// Check a configuration table without opening any connection.
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Open the connection, configure the controller, and return the axis.
    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>>;
}
