//! # Mirror Audio Player Library (mirror-ap)
//!
//! Audio output stage of a screen-mirroring receiver.
//!
//! **Purpose:** Decode a stream of compressed audio frames (AAC-ELD by
//! default) one access unit at a time, write each decoded frame to an audio
//! device with blocking, device-paced writes, and drive the device's
//! hardware gain from the sender's volume.
//!
//! **Architecture:** codec backend (fdk-aac or symphonia) + ALSA PCM and
//! control handles, composed by [`renderer::MirrorRenderer`].

pub mod audio;
pub mod config;
pub mod error;
pub mod frames;
pub mod renderer;

pub use error::{Error, Result};
pub use renderer::{AudioRenderer, MirrorRenderer};
