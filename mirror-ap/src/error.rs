//! Error types for mirror-ap
//!
//! Construction errors abort renderer creation and leave nothing allocated.
//! Runtime errors are reported according to the renderer's error policy.

use thiserror::Error;

/// Main error type for mirror-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from shared receiver code
    #[error(transparent)]
    Common(#[from] mirror_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoder instance could not be allocated
    #[error("Decoder init error: {0}")]
    DecoderInit(String),

    /// Decoder rejected the raw stream configuration
    #[error("Decoder config error: {0}")]
    DecoderConfig(String),

    /// Decoder did not accept the compressed input
    #[error("Decoder fill error: {0}")]
    DecodeFill(String),

    /// Decoder failed to produce a frame
    #[error("Decode frame error: {0}")]
    DecodeFrame(String),

    /// Playback device could not be opened
    #[error("Failed to open audio device '{device}': {reason}")]
    DeviceOpen { device: String, reason: String },

    /// Playback device cannot satisfy the fixed stream format
    #[error("Audio device '{device}' rejected stream parameters: {reason}")]
    DeviceConfig { device: String, reason: String },

    /// Control surface of the device could not be opened
    #[error("Failed to open control surface of '{device}': {reason}")]
    ControlOpen { device: String, reason: String },

    /// Decoder configuration does not produce the output stream format
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Device write failed (underrun or other device error)
    #[error("Audio device write failed (errno {errno}): {reason}")]
    DeviceWrite { errno: i32, reason: String },

    /// Device could not recover from a write error
    #[error("Audio device recovery failed (errno {errno}): {reason}")]
    DeviceRecover { errno: i32, reason: String },

    /// Device failed too many consecutive writes
    #[error("Audio device lost after {consecutive_failures} consecutive failed writes")]
    DeviceLost { consecutive_failures: u32 },

    /// Volume value could not be converted to hardware gain
    #[error("Volume conversion error: {0}")]
    VolumeConvert(String),

    /// Hardware gain could not be written
    #[error("Volume write error: {0}")]
    VolumeWrite(String),

    /// Input violated the one-buffer-one-frame contract
    #[error("Frame contract violation: {0}")]
    FrameContract(String),

    /// Decoded frame dump could not be written
    #[error("PCM dump error: {0}")]
    Dump(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// True for errors that can only occur while constructing a renderer.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::DecoderInit(_)
                | Error::DecoderConfig(_)
                | Error::DeviceOpen { .. }
                | Error::DeviceConfig { .. }
                | Error::ControlOpen { .. }
                | Error::FormatMismatch(_)
        )
    }
}

/// Convenience Result type using mirror-ap Error
pub type Result<T> = std::result::Result<T, Error>;
