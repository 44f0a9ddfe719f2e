//! `DriverFactory` implementation for Lexium controllers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use motor_driver_lexium::LexiumFactory;
//! use motor_core::driver::DriverFactory;
//!
//! let config = toml::toml! {
//!     motor_port_name = "M06"
//!     target = "ts-b34-nw08:2101"
//!     moving_poll_ms = 100
//!     idle_poll_ms = 1000
//! };
//! let components = LexiumFactory.build(config.into()).await?;
//! ```

use crate::controller::{LexiumConfig, LexiumController};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use motor_core::driver::{DeviceComponents, DriverFactory};
use std::sync::Arc;

/// Factory for Lexium MDrive axes.
pub struct LexiumFactory;

impl DriverFactory for LexiumFactory {
    fn driver_type(&self) -> &'static str {
        "lexium"
    }

    fn name(&self) -> &'static str {
        "Schneider Lexium MDrive Motor Controller"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: LexiumConfig = config.clone().try_into()?;
        cfg.validate()?;
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>> {
        Box::pin(async move {
            let cfg: LexiumConfig = config.try_into().context("Invalid Lexium config")?;
            let axis = LexiumController::connect(&cfg)
                .await
                .with_context(|| format!("Failed to connect Lexium controller {}", cfg.motor_port_name))?;

            Ok(DeviceComponents::new(Arc::new(axis), cfg.poll_periods()))
        })
    }
}
