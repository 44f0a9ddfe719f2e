//! Mock controller setup shared by the integration suites.

#![allow(dead_code, unused_imports)]

pub use motor_driver_lexium::test_support::*;
