//! Compressed frame decoding
//!
//! [`CodecBackend`] allocates decoder instances, [`FrameDecoder`] is one
//! stateful codec context, and [`DecoderBinding`] owns a configured context
//! for the lifetime of a renderer.
//!
//! The binding always runs the same sequence: allocate, apply the raw
//! configuration once, log stream info. After that each render call fills
//! exactly one access unit and pulls exactly one frame.

use crate::audio::asc::AudioSpecificConfig;
use crate::audio::types::PcmFrame;
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Stream parameters reported by a configured decoder.
///
/// Only logged. The binding never branches on these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub channels: u32,
    pub sample_rate: u32,
    pub samples_per_frame: u32,
    pub object_type: u32,
    pub bitrate: u32,
}

/// Allocates decoder contexts.
pub trait CodecBackend: Send + Sync {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Allocate an unconfigured decoder in raw, single-layer transport mode.
    ///
    /// # Errors
    /// `DecoderInit` if allocation fails.
    fn open(&self) -> Result<Box<dyn FrameDecoder>>;
}

/// A stateful codec context.
pub trait FrameDecoder: Send {
    /// Apply the raw stream configuration. Called exactly once, before any fill.
    ///
    /// # Errors
    /// `DecoderConfig` if the configuration is rejected.
    fn configure_raw(&mut self, config: &AudioSpecificConfig) -> Result<()>;

    /// Current stream info, if the decoder exposes it.
    fn stream_info(&self) -> Option<StreamInfo>;

    /// Push one compressed access unit into the decoder's input buffer.
    ///
    /// Returns the number of bytes consumed.
    fn fill(&mut self, data: &[u8]) -> Result<usize>;

    /// Decode one frame of interleaved samples into `pcm`.
    ///
    /// Returns the number of interleaved samples the decoder produced.
    fn decode_frame(&mut self, pcm: &mut [i16]) -> Result<usize>;

    /// Release codec resources. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Configured decoder owned by a renderer.
pub struct DecoderBinding {
    decoder: Option<Box<dyn FrameDecoder>>,
    config: AudioSpecificConfig,
    backend: &'static str,
}

impl DecoderBinding {
    /// Allocate and configure a decoder.
    ///
    /// If configuration fails the freshly allocated decoder is closed before
    /// the error is returned.
    pub fn open(backend: &dyn CodecBackend, config: &AudioSpecificConfig) -> Result<Self> {
        let mut decoder = backend.open()?;

        if let Err(e) = decoder.configure_raw(config) {
            decoder.close();
            return Err(e);
        }

        match decoder.stream_info() {
            Some(info) => debug!(
                "Stream info: channels={} sample_rate={} frame_size={} aot={} bitrate={}",
                info.channels, info.sample_rate, info.samples_per_frame, info.object_type, info.bitrate
            ),
            None => debug!("Decoder '{}' exposes no stream info", backend.name()),
        }

        Ok(Self {
            decoder: Some(decoder),
            config: config.clone(),
            backend: backend.name(),
        })
    }

    pub fn config(&self) -> &AudioSpecificConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    pub fn is_open(&self) -> bool {
        self.decoder.is_some()
    }

    /// Allocate a silent frame sized for this stream configuration
    pub fn new_frame(&self) -> PcmFrame {
        PcmFrame::silent(self.config.frame_length() as usize, self.config.channels())
    }

    /// Feed one compressed access unit.
    pub fn fill(&mut self, data: &[u8]) -> Result<usize> {
        let decoder = self.decoder_mut()?;
        let consumed = decoder.fill(data)?;
        if consumed < data.len() {
            warn!(
                "Decoder input buffer accepted {} of {} bytes",
                consumed,
                data.len()
            );
        }
        Ok(consumed)
    }

    /// Decode one frame into `frame`.
    ///
    /// # Errors
    /// - `DecodeFrame` from the codec
    /// - `FrameContract` if the decoder produced a frame of a different size
    ///   than the configuration promises
    pub fn decode(&mut self, frame: &mut PcmFrame) -> Result<usize> {
        let expected = self.config.frame_samples();
        let decoder = self.decoder_mut()?;
        let produced = decoder.decode_frame(frame.samples_mut())?;

        if produced != expected {
            return Err(Error::FrameContract(format!(
                "Decoder produced {} samples, stream configuration expects {}",
                produced, expected
            )));
        }
        Ok(produced)
    }

    /// Release the decoder. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.close();
            debug!("Decoder '{}' closed", self.backend);
        }
    }

    fn decoder_mut(&mut self) -> Result<&mut Box<dyn FrameDecoder>> {
        self.decoder
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Decoder already closed".to_string()))
    }
}

impl Drop for DecoderBinding {
    fn drop(&mut self) {
        self.close();
    }
}
