//! Render pipeline counters
//!
//! Lock-free so that `stats()` can be read from another thread while a
//! render call is blocked in a device write.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-renderer counters.
#[derive(Debug, Default)]
pub struct RenderStats {
    /// Non-empty buffers submitted
    buffers_rendered: AtomicU64,

    /// Frames the device accepted
    frames_written: AtomicU64,

    /// Fill or decode failures
    decode_errors: AtomicU64,

    /// Write errors reported as underrun (EPIPE)
    underruns: AtomicU64,

    /// Write errors other than underrun
    write_errors: AtomicU64,

    /// Device recoveries that succeeded
    recoveries: AtomicU64,

    /// Device recoveries that failed
    recovery_failures: AtomicU64,

    /// Short writes without an error
    partial_writes: AtomicU64,

    /// Oversize input or wrong decoded frame size
    contract_violations: AtomicU64,

    /// Failed volume conversions or writes
    volume_errors: AtomicU64,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatsSnapshot {
    pub buffers_rendered: u64,
    pub frames_written: u64,
    pub decode_errors: u64,
    pub underruns: u64,
    pub write_errors: u64,
    pub recoveries: u64,
    pub recovery_failures: u64,
    pub partial_writes: u64,
    pub contract_violations: u64,
    pub volume_errors: u64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_buffer(&self) {
        self.buffers_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_written(&self, frames: usize) {
        self.frames_written.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a device write error, split by underrun vs. anything else.
    pub fn record_write_error(&self, underrun: bool) {
        if underrun {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_recovery(&self, succeeded: bool) {
        if succeeded {
            self.recoveries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.recovery_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_partial_write(&self) {
        self.partial_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_contract_violation(&self) {
        self.contract_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_volume_error(&self) {
        self.volume_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderStatsSnapshot {
        RenderStatsSnapshot {
            buffers_rendered: self.buffers_rendered.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            recovery_failures: self.recovery_failures.load(Ordering::Relaxed),
            partial_writes: self.partial_writes.load(Ordering::Relaxed),
            contract_violations: self.contract_violations.load(Ordering::Relaxed),
            volume_errors: self.volume_errors.load(Ordering::Relaxed),
        }
    }
}

impl RenderStatsSnapshot {
    /// Device write errors of any kind
    pub fn device_errors(&self) -> u64 {
        self.underruns + self.write_errors
    }
}
