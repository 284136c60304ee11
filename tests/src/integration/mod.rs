//! # Integration Tests
//!
//! Cross-crate tests of the messenger contracts and of the runtime driver.

pub mod lanes;
pub mod properties;
pub mod scenarios;
