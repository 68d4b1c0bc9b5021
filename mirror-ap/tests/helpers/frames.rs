//! Compressed frame fixtures

use mirror_ap::frames::encode_frame;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// A plausible access unit of `len` bytes
pub fn access_unit(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Writes length-prefixed frame files into a temporary directory.
pub struct FrameFileBuilder {
    temp_dir: TempDir,
}

impl FrameFileBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.temp_dir.path().join(filename)
    }

    /// Write `frames` as one frame file.
    pub fn write(&self, filename: &str, frames: &[Vec<u8>]) -> PathBuf {
        let path = self.file_path(filename);
        let mut file = File::create(&path).expect("Failed to create frame file");
        for frame in frames {
            file.write_all(&encode_frame(frame).expect("Frame too long"))
                .expect("Failed to write frame");
        }
        path
    }
}
