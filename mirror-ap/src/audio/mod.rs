//! Audio decode and output bindings
//!
//! - `asc`: raw stream configuration parsing
//! - `decoder`: codec backends and the decoder binding
//! - `output`: device handles, the playback binding and hardware volume
//! - `dump`: optional WAV dump of decoded frames

pub mod asc;
pub mod decoder;
pub mod dump;
pub mod output;
pub mod types;

#[cfg(target_os = "linux")]
pub mod alsa_host;
#[cfg(feature = "fdk")]
pub mod fdk;
pub mod symphonia_aac;

pub use asc::AudioSpecificConfig;
pub use decoder::{CodecBackend, DecoderBinding, FrameDecoder, StreamInfo};
pub use output::{
    AudioHost, ControlElement, ControlSurface, DeviceFault, OutputBinding, PlaybackStream,
    VolumeControl, VolumeOutcome, VolumeState, WriteStatus,
};
pub use types::{PcmFrame, SampleFormat, StreamFormat};

use crate::error::{Error, Result};
use serde::Deserialize;

/// Which codec backend decodes the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecoderKind {
    /// libfdk-aac (AAC-ELD and AAC-LC)
    Fdk,
    /// symphonia (AAC-LC only)
    Symphonia,
}

impl Default for DecoderKind {
    fn default() -> Self {
        if cfg!(feature = "fdk") {
            DecoderKind::Fdk
        } else {
            DecoderKind::Symphonia
        }
    }
}

impl std::str::FromStr for DecoderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fdk" => Ok(DecoderKind::Fdk),
            "symphonia" => Ok(DecoderKind::Symphonia),
            other => Err(Error::Config(format!("Unknown decoder '{}'", other))),
        }
    }
}

/// Instantiate the codec backend for `kind`.
pub fn codec_backend(kind: DecoderKind) -> Result<Box<dyn CodecBackend>> {
    match kind {
        #[cfg(feature = "fdk")]
        DecoderKind::Fdk => Ok(Box::new(fdk::FdkAacBackend)),
        #[cfg(not(feature = "fdk"))]
        DecoderKind::Fdk => Err(Error::Config(
            "Built without the 'fdk' feature; fdk-aac decoder unavailable".to_string(),
        )),
        DecoderKind::Symphonia => Ok(Box::new(symphonia_aac::SymphoniaAacBackend)),
    }
}

/// The platform's audio host.
pub fn default_host() -> Result<Box<dyn AudioHost>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(alsa_host::AlsaHost::new()))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(Error::Config("No audio host available on this platform".to_string()))
    }
}
