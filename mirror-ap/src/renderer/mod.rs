//! Audio renderer lifecycle
//!
//! [`AudioRenderer`] is the uniform surface the surrounding player drives:
//! create, start, render one buffer at a time, set volume, flush, destroy.
//! [`MirrorRenderer`] is the decoder + device implementation.

pub mod mirror;
pub mod policy;
pub mod stats;

pub use mirror::MirrorRenderer;
pub use policy::{ErrorPolicy, FailureTracker};
pub use stats::{RenderStats, RenderStatsSnapshot};

use crate::audio::output::WriteStatus;
use crate::error::{Error, Result};

/// Shared network clock, as provided by the streaming layer.
pub trait ClockReference: Send + Sync {
    /// Current local time in nanoseconds
    fn local_time_ns(&self) -> u64;
}

/// Co-located video renderer, observed only.
pub trait VideoRenderer: Send + Sync {
    /// Whether this video renderer runs on the given hardware acceleration family.
    fn shares_hardware_family(&self, family: &str) -> bool;
}

/// Lifecycle surface of an audio backend.
///
/// Calls are expected serially from the streaming thread, except
/// `set_volume`, which may arrive from any thread.
pub trait AudioRenderer: Send + Sync {
    /// Playback is about to begin. Advisory.
    fn start(&self) {}

    /// Decode one compressed frame and queue it for playback.
    ///
    /// # Arguments
    /// - `clock`: network clock, if synchronized playback is in use
    /// - `data`: exactly one compressed access unit; empty input is a no-op
    /// - `pts`: presentation timestamp of `data`
    ///
    /// # Errors
    /// Runtime errors according to the renderer's [`ErrorPolicy`];
    /// `InvalidState` after destroy.
    fn render_buffer(
        &self,
        clock: Option<&dyn ClockReference>,
        data: &[u8],
        pts: u64,
    ) -> Result<RenderReport>;

    /// Apply a sender volume value to the output.
    fn set_volume(&self, volume: f32) -> Result<()>;

    /// Discard queued audio (seek / stream restart).
    fn flush(&self) {}

    /// Release every resource. Repeated calls are no-ops.
    fn destroy(&self);
}

/// Destroy `renderer` if there is one.
pub fn destroy_renderer(renderer: Option<&dyn AudioRenderer>) {
    if let Some(renderer) = renderer {
        renderer.destroy();
    }
}

/// Renderer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Constructed,
    Running,
    Destroyed,
}

/// What happened to one rendered buffer.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Compressed bytes submitted
    pub bytes: usize,

    /// Fill or decode failure absorbed under the tolerant policy
    pub decode_error: Option<Error>,

    /// Outcome of the device write; `None` when no write was attempted
    pub write: Option<WriteStatus>,
}

impl RenderReport {
    /// True when the call made no decode or write attempt
    pub fn is_noop(&self) -> bool {
        self.bytes == 0 && self.write.is_none()
    }

    pub fn frames_written(&self) -> usize {
        self.write.as_ref().map_or(0, WriteStatus::frames_written)
    }

    /// Decoded and fully written without any error
    pub fn is_clean(&self) -> bool {
        self.decode_error.is_none() && matches!(self.write, Some(WriteStatus::Complete { .. }))
    }
}
