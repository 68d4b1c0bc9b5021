//! # Mirror Common Library
//!
//! Shared code for the mirroring receiver components:
//! - Bootstrap configuration loading (TOML)
//! - Tracing subscriber setup
//! - Gain unit conversions for hardware volume control

pub mod config;
pub mod error;
pub mod gain;
pub mod logging;

pub use error::{Error, Result};
pub use gain::GainUnit;
