//! Test helper modules for mirror-ap integration tests
//!
//! Provides reusable test infrastructure components:
//! - Doubles: scripted codec and device backends with leak counters
//! - Frames: compressed frame fixtures and frame files

#![allow(dead_code, unused_imports)]

pub mod doubles;
pub mod frames;

pub use doubles::{
    volume_elements, CallProbe, MockCodec, MockHost, MockVideo, Rig, ScriptedWrite, WriteGate,
    VOLUME_NUMID,
};
pub use frames::{access_unit, FrameFileBuilder};
