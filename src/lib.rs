//! Host application support for Lexium MDrive controllers.
//!
//! The driver itself lives in `motor-driver-lexium`; this crate holds what a
//! host needs around it: layered configuration and logging setup. The
//! `lexium-motor` binary ties them to the poll scheduler from `motor-core`.

pub mod config;
pub mod logging;
