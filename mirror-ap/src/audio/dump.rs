//! Decoded frame dump
//!
//! Debug aid: appends every decoded frame to a 16-bit WAV file before it is
//! written to the device, so decoder output can be inspected offline.

use crate::audio::types::{PcmFrame, StreamFormat};
use crate::error::{Error, Result};
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct PcmDump {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    frames: u64,
}

impl PcmDump {
    /// Create (truncate) the dump file.
    pub fn create(path: &Path, format: &StreamFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .map_err(|e| Error::Dump(format!("Failed to create {}: {}", path.display(), e)))?;

        info!("Dumping decoded audio to {}", path.display());
        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames appended so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn append(&mut self, frame: &PcmFrame) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("PCM dump already finalized".to_string()))?;

        for &sample in frame.samples() {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Dump(e.to_string()))?;
        }
        self.frames += frame.frames() as u64;
        Ok(())
    }

    /// Write the WAV header sizes and close the file. Safe to call more than once.
    pub fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| Error::Dump(e.to_string()))?;
            info!("PCM dump {} closed after {} frames", self.path.display(), self.frames);
        }
        Ok(())
    }
}

impl Drop for PcmDump {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}
