//! Common test utilities for drive-extract integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fake_drive;

#[allow(unused_imports)]
pub use assertions::*;
pub use config::*;
#[allow(unused_imports)]
pub use fake_drive::*;
