//! AAC-LC decoding using symphonia
//!
//! Pure-Rust backend for senders that stream AAC-LC instead of ELD. The
//! configuration blob is passed to symphonia as codec extra data, exactly
//! as an MP4 demuxer would.

use crate::audio::asc::{AudioSpecificConfig, AOT_AAC_LC};
use crate::audio::decoder::{CodecBackend, FrameDecoder, StreamInfo};
use crate::error::{Error, Result};
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_AAC};
use symphonia::core::formats::Packet;
use symphonia::default::codecs::AacDecoder;
use tracing::trace;

/// Allocates symphonia AAC-LC decoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaAacBackend;

impl CodecBackend for SymphoniaAacBackend {
    fn name(&self) -> &'static str {
        "symphonia-aac"
    }

    fn open(&self) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(SymphoniaAacDecoder {
            decoder: None,
            pending: None,
            info: None,
            next_ts: 0,
            closed: false,
        }))
    }
}

struct SymphoniaAacDecoder {
    decoder: Option<AacDecoder>,
    /// Access unit waiting for `decode_frame`
    pending: Option<Vec<u8>>,
    info: Option<StreamInfo>,
    next_ts: u64,
    closed: bool,
}

fn channel_mask(channels: u16) -> Option<Channels> {
    match channels {
        1 => Some(Channels::FRONT_CENTRE),
        2 => Some(Channels::FRONT_LEFT | Channels::FRONT_RIGHT),
        _ => None,
    }
}

impl FrameDecoder for SymphoniaAacDecoder {
    fn configure_raw(&mut self, config: &AudioSpecificConfig) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("symphonia decoder closed".to_string()));
        }
        if config.object_type() != AOT_AAC_LC {
            return Err(Error::DecoderConfig(format!(
                "Audio object type {} is not supported by symphonia (AAC-LC only)",
                config.object_type()
            )));
        }
        let channels = channel_mask(config.channels()).ok_or_else(|| {
            Error::DecoderConfig(format!("Unsupported channel count {}", config.channels()))
        })?;

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(config.sample_rate())
            .with_channels(channels)
            .with_extra_data(config.as_bytes().to_vec().into_boxed_slice());

        let decoder = AacDecoder::try_new(&params, &DecoderOptions::default())
            .map_err(|e| Error::DecoderConfig(e.to_string()))?;

        self.decoder = Some(decoder);
        self.info = Some(StreamInfo {
            channels: config.channels() as u32,
            sample_rate: config.sample_rate(),
            samples_per_frame: config.frame_length(),
            object_type: config.object_type(),
            bitrate: 0,
        });
        Ok(())
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        self.info
    }

    fn fill(&mut self, data: &[u8]) -> Result<usize> {
        if self.decoder.is_none() {
            return Err(Error::DecodeFill("Decoder not configured".to_string()));
        }
        if self.pending.is_some() {
            trace!("Replacing undecoded access unit");
        }
        self.pending = Some(data.to_vec());
        Ok(data.len())
    }

    fn decode_frame(&mut self, pcm: &mut [i16]) -> Result<usize> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| Error::DecodeFrame("Decoder not configured".to_string()))?;
        let data = self
            .pending
            .take()
            .ok_or_else(|| Error::DecodeFrame("No access unit filled".to_string()))?;

        let packet = Packet::new_from_slice(0, self.next_ts, 0, &data);
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::DecodeFrame(e.to_string()))?;

        let frames = decoded.frames();
        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);

        let produced = samples.samples();
        let n = produced.len().min(pcm.len());
        pcm[..n].copy_from_slice(&produced[..n]);

        self.next_ts += frames as u64;
        Ok(produced.len())
    }

    fn close(&mut self) {
        self.decoder = None;
        self.pending = None;
        self.closed = true;
    }
}
