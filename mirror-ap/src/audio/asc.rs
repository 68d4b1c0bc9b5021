//! MPEG-4 AudioSpecificConfig parsing
//!
//! The raw configuration blob handed to the decoder before the first frame.
//! Parsing it here lets the renderer size PCM frames and check the decoder
//! against the output stream format before anything is opened.

use crate::error::{Error, Result};
use symphonia::core::io::{BitReaderLtr, ReadBitsLtr};

/// AAC Low Complexity
pub const AOT_AAC_LC: u32 = 2;
/// Error-resilient AAC Low Delay
pub const AOT_ER_AAC_LD: u32 = 23;
/// Error-resilient AAC Enhanced Low Delay
pub const AOT_ER_AAC_ELD: u32 = 39;

/// Mirroring stream configuration: AAC-ELD, 44.1 kHz, stereo, 480 samples/frame
pub const ELD_STEREO_44100_480: [u8; 4] = [0xF8, 0xE8, 0x50, 0x00];

/// Largest compressed access unit per channel, in bytes (6144 bits)
pub const MAX_ACCESS_UNIT_BYTES_PER_CHANNEL: usize = 6144 / 8;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Parsed AudioSpecificConfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    object_type: u32,
    sample_rate: u32,
    channel_configuration: u8,
    frame_length: u32,
    raw: Vec<u8>,
}

impl AudioSpecificConfig {
    /// Parse a raw config blob.
    ///
    /// Supports the GA object types (LC and relatives), ER AAC LD and
    /// ER AAC ELD with a channel configuration of 1..=7. Program config
    /// elements and SBR/PS signalling are rejected.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(Error::Config(format!(
                "AudioSpecificConfig too short: {} bytes",
                raw.len()
            )));
        }

        let mut bs = BitReaderLtr::new(raw);
        let truncated = |e: std::io::Error| Error::Config(format!("Truncated AudioSpecificConfig: {}", e));

        let mut object_type = bs.read_bits_leq32(5).map_err(truncated)?;
        if object_type == 31 {
            object_type = 32 + bs.read_bits_leq32(6).map_err(truncated)?;
        }

        let frequency_index = bs.read_bits_leq32(4).map_err(truncated)?;
        let sample_rate = if frequency_index == 0xF {
            bs.read_bits_leq32(24).map_err(truncated)?
        } else {
            *SAMPLE_RATES.get(frequency_index as usize).ok_or_else(|| {
                Error::Config(format!("Reserved sampling frequency index {}", frequency_index))
            })?
        };

        let channel_configuration = bs.read_bits_leq32(4).map_err(truncated)? as u8;
        if channel_configuration == 0 || channel_configuration > 7 {
            return Err(Error::Config(format!(
                "Unsupported channel configuration {}",
                channel_configuration
            )));
        }

        let frame_length_flag = match object_type {
            1 | 2 | 3 | 4 | 6 | 7 | 17 | 19 | 20 | 21 | 22 | AOT_ER_AAC_LD | AOT_ER_AAC_ELD => {
                bs.read_bool().map_err(truncated)?
            }
            other => {
                return Err(Error::Config(format!("Unsupported audio object type {}", other)));
            }
        };

        let frame_length = match (object_type, frame_length_flag) {
            (AOT_ER_AAC_LD, true) | (AOT_ER_AAC_ELD, true) => 480,
            (AOT_ER_AAC_LD, false) | (AOT_ER_AAC_ELD, false) => 512,
            (_, true) => 960,
            (_, false) => 1024,
        };

        Ok(Self {
            object_type,
            sample_rate,
            channel_configuration,
            frame_length,
            raw: raw.to_vec(),
        })
    }

    /// The default mirroring stream configuration.
    pub fn mirror_default() -> Self {
        Self {
            object_type: AOT_ER_AAC_ELD,
            sample_rate: 44100,
            channel_configuration: 2,
            frame_length: 480,
            raw: ELD_STEREO_44100_480.to_vec(),
        }
    }

    pub fn object_type(&self) -> u32 {
        self.object_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_configuration(&self) -> u8 {
        self.channel_configuration
    }

    /// Output channel count implied by the channel configuration
    pub fn channels(&self) -> u16 {
        match self.channel_configuration {
            7 => 8,
            n => n as u16,
        }
    }

    /// Samples per channel in one decoded frame
    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    /// Interleaved samples in one decoded frame
    pub fn frame_samples(&self) -> usize {
        self.frame_length as usize * self.channels() as usize
    }

    /// Upper bound on the size of one compressed access unit
    pub fn max_access_unit_bytes(&self) -> usize {
        MAX_ACCESS_UNIT_BYTES_PER_CHANNEL * self.channels() as usize
    }

    /// Raw bytes as handed to the decoder
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl Default for AudioSpecificConfig {
    fn default() -> Self {
        Self::mirror_default()
    }
}
