//! Core audio data types
//!
//! Output stream format contract and the decoded PCM frame handed from the
//! decoder to the device.

/// Sample encoding on the wire to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian
    S16Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
        }
    }
}

/// Fixed playback stream parameters.
///
/// Applied to the device as one set at open time and never changed
/// afterwards. Samples are always interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    /// Allow the device layer to resample if the hardware rate differs
    pub soft_resample: bool,
    /// Requested total buffering in microseconds
    pub latency_us: u32,
}

impl StreamFormat {
    /// Mirroring output: S16_LE, stereo, 44.1 kHz, ~100 ms buffering.
    pub const MIRROR: StreamFormat = StreamFormat {
        sample_format: SampleFormat::S16Le,
        channels: 2,
        sample_rate: 44100,
        soft_resample: true,
        latency_us: 100_000,
    };

    /// Bytes in one frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    pub fn samples_to_frames(&self, samples: usize) -> usize {
        samples / self.channels as usize
    }

    /// Requested period time: a quarter of the buffer
    pub fn period_us(&self) -> u32 {
        self.latency_us / 4
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::MIRROR
    }
}

/// One decoded frame of interleaved 16-bit PCM.
///
/// Allocated zeroed for every render call so a failed decode still hands
/// silence to the device instead of stale data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    samples: Vec<i16>,
    channels: u16,
}

impl PcmFrame {
    /// Create a silent frame of `frames` frames.
    pub fn silent(frames: usize, channels: u16) -> Self {
        Self {
            samples: vec![0; frames * channels as usize],
            channels,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * SampleFormat::S16Le.bytes_per_sample()
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_format_frame_math() {
        let format = StreamFormat::MIRROR;
        assert_eq!(format.bytes_per_frame(), 4);
        // 4 bytes x 480 samples decoded per compressed frame
        assert_eq!(format.bytes_to_frames(4 * 480), 480);
        assert_eq!(format.samples_to_frames(960), 480);
        assert_eq!(format.period_us(), 25_000);
    }

    #[test]
    fn test_silent_frame() {
        let frame = PcmFrame::silent(480, 2);
        assert_eq!(frame.frames(), 480);
        assert_eq!(frame.samples().len(), 960);
        assert_eq!(frame.byte_len(), 1920);
        assert!(frame.is_silent());
    }

    #[test]
    fn test_frame_mutation() {
        let mut frame = PcmFrame::silent(2, 2);
        frame.samples_mut()[3] = -7;
        assert!(!frame.is_silent());
        assert_eq!(frame.samples(), &[0, 0, 0, -7]);
    }
}
