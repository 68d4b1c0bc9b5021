//! Decoder + output device renderer
//!
//! Owns one [`DecoderBinding`], one [`OutputBinding`] and one
//! [`VolumeControl`], all bound for the renderer's lifetime. The decode/write
//! pipeline and the volume control sit behind separate locks so that a volume
//! change does not wait on a device write that is blocked for pacing.

use crate::audio::decoder::{CodecBackend, DecoderBinding};
use crate::audio::dump::PcmDump;
use crate::audio::output::{
    AudioHost, OutputBinding, VolumeControl, VolumeOutcome, VolumeState, WriteStatus,
};
use crate::audio::types::{PcmFrame, StreamFormat};
use crate::audio::{codec_backend, default_host};
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::renderer::policy::{ErrorPolicy, FailureTracker};
use crate::renderer::stats::{RenderStats, RenderStatsSnapshot};
use crate::renderer::{AudioRenderer, ClockReference, RenderReport, RendererState, VideoRenderer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, info_span, trace, warn, Span};

/// Decode/write state, locked per render call.
struct Pipeline {
    decoder: DecoderBinding,
    output: OutputBinding,
    dump: Option<PcmDump>,
    failures: FailureTracker,
}

pub struct MirrorRenderer {
    span: Span,
    device: String,
    policy: ErrorPolicy,
    state: Mutex<RendererState>,
    pipeline: Mutex<Option<Pipeline>>,
    volume: Mutex<Option<VolumeControl>>,
    stats: RenderStats,
    /// Kept only when it runs on the audio host's hardware family
    video: Option<Arc<dyn VideoRenderer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MirrorRenderer {
    /// Create a renderer on the platform audio host with the configured decoder.
    ///
    /// # Arguments
    /// - `config`: renderer section of the bootstrap configuration
    /// - `video`: co-located video renderer, if any
    ///
    /// # Errors
    /// Any construction error. Nothing stays allocated on failure.
    pub fn create(config: &RendererConfig, video: Option<Arc<dyn VideoRenderer>>) -> Result<Self> {
        let codec = codec_backend(config.decoder)?;
        let host = default_host()?;
        Self::with_backends(codec.as_ref(), host.as_ref(), config, video)
    }

    /// Create a renderer from explicit codec and device backends.
    ///
    /// Phase one opens and configures the decoder. Phase two opens the
    /// playback stream and then the control surface of the same device.
    /// A failure in any phase releases what the earlier phases allocated.
    pub fn with_backends(
        codec: &dyn CodecBackend,
        host: &dyn AudioHost,
        config: &RendererConfig,
        video: Option<Arc<dyn VideoRenderer>>,
    ) -> Result<Self> {
        let device = config.device_name().to_string();
        let span = info_span!("audio_renderer", device = %device);
        let _enter = span.enter();

        let asc = config.audio_specific_config()?;
        let format = StreamFormat::MIRROR;
        if asc.sample_rate() != format.sample_rate || asc.channels() != format.channels {
            return Err(Error::FormatMismatch(format!(
                "Stream configuration decodes to {} ch @ {} Hz, output is fixed at {} ch @ {} Hz",
                asc.channels(),
                asc.sample_rate(),
                format.channels,
                format.sample_rate
            )));
        }

        let mut decoder = DecoderBinding::open(codec, &asc).map_err(|e| {
            error!("Decoder init failed: {}", e);
            e
        })?;

        let mut output = match OutputBinding::open(host, &device, format) {
            Ok(output) => output,
            Err(e) => {
                error!("Output init failed: {}", e);
                decoder.close();
                return Err(e);
            }
        };

        let volume = match VolumeControl::open(host, &device, &config.volume_element, config.gain_unit) {
            Ok(volume) => volume,
            Err(e) => {
                error!("Control surface init failed: {}", e);
                decoder.close();
                output.close();
                return Err(e);
            }
        };

        let dump = match config.dump_pcm.as_deref().map(|path| PcmDump::create(path, &format)) {
            Some(Ok(dump)) => Some(dump),
            Some(Err(e)) => {
                warn!("PCM dump disabled: {}", e);
                None
            }
            None => None,
        };

        let video = match (video, host.hardware_family()) {
            (Some(video), Some(family)) if video.shares_hardware_family(family) => {
                debug!("Video renderer shares hardware family '{}'", family);
                Some(video)
            }
            (Some(_), _) => {
                debug!("Video renderer does not share the audio hardware context");
                None
            }
            (None, _) => None,
        };

        info!(
            "Audio renderer ready: decoder={} policy={} gain_unit={} volume={}",
            decoder.backend_name(),
            config.error_policy.as_str(),
            config.gain_unit.as_str(),
            if volume.has_volume() { "hardware" } else { "disabled" }
        );

        drop(_enter);
        Ok(Self {
            span,
            device,
            policy: config.error_policy,
            state: Mutex::new(RendererState::Constructed),
            pipeline: Mutex::new(Some(Pipeline {
                decoder,
                output,
                dump,
                failures: FailureTracker::new(config.max_consecutive_failures),
            })),
            volume: Mutex::new(Some(volume)),
            stats: RenderStats::new(),
            video,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn state(&self) -> RendererState {
        *lock(&self.state)
    }

    pub fn stats(&self) -> RenderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether a video renderer sharing the hardware context was retained
    pub fn shares_video_context(&self) -> bool {
        self.video.is_some()
    }

    /// Whether hardware volume control is available on this instance
    pub fn has_volume(&self) -> bool {
        lock(&self.volume).as_ref().is_some_and(VolumeControl::has_volume)
    }

    /// Last volume successfully written to hardware
    pub fn volume_state(&self) -> Option<VolumeState> {
        lock(&self.volume).as_ref().and_then(VolumeControl::last_applied)
    }

    /// Read the gain element back from the device.
    ///
    /// Returns `None` when volume control is disabled.
    pub fn read_hardware_volume(&self) -> Result<Option<(i64, i64)>> {
        let guard = lock(&self.volume);
        let control = guard
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Renderer destroyed".to_string()))?;
        control.read_back()
    }

    /// Fill the decoder and decode one frame into `frame`.
    ///
    /// A fill failure under the tolerant policy still lets the decoder try
    /// to produce a frame from whatever it has buffered.
    fn decode_into(&self, pipeline: &mut Pipeline, data: &[u8], frame: &mut PcmFrame) -> Result<Option<Error>> {
        let mut absorbed = None;

        if let Err(e) = pipeline.decoder.fill(data) {
            error!("Decoder fill failed: {}", e);
            self.stats.record_decode_error();
            if self.policy.is_strict() {
                return Err(e);
            }
            absorbed = Some(e);
        }

        match pipeline.decoder.decode(frame) {
            Ok(_) => {}
            Err(e @ Error::FrameContract(_)) => return Err(e),
            Err(e) => {
                error!("Decoding failed: {}", e);
                self.stats.record_decode_error();
                if self.policy.is_strict() {
                    return Err(e);
                }
                if absorbed.is_none() {
                    absorbed = Some(e);
                }
            }
        }

        Ok(absorbed)
    }

    /// Account for a write outcome and apply the error policy to it.
    fn settle_write(&self, failures: &mut FailureTracker, status: &WriteStatus) -> Result<()> {
        self.stats.record_frames_written(status.frames_written());

        match status {
            WriteStatus::Complete { .. } | WriteStatus::Empty { .. } => failures.record_success(),
            WriteStatus::Partial { .. } => {
                self.stats.record_partial_write();
                failures.record_success();
            }
            WriteStatus::Recovered { fault } => {
                self.stats.record_write_error(fault.is_underrun());
                self.stats.record_recovery(true);
                if self.policy.is_strict() {
                    return Err(Error::DeviceWrite {
                        errno: fault.errno,
                        reason: fault.message.clone(),
                    });
                }
            }
            WriteStatus::Failed { fault, recovery } => {
                self.stats.record_write_error(fault.is_underrun());
                self.stats.record_recovery(false);
                if let Err(lost) = failures.record_failure() {
                    error!("{}", lost);
                    return Err(lost);
                }
                if self.policy.is_strict() {
                    return Err(Error::DeviceRecover {
                        errno: recovery.errno,
                        reason: recovery.message.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl AudioRenderer for MirrorRenderer {
    fn start(&self) {
        let _enter = self.span.enter();
        let mut state = lock(&self.state);
        match *state {
            RendererState::Constructed => {
                *state = RendererState::Running;
                debug!("Audio renderer started");
            }
            RendererState::Running => trace!("Audio renderer already running"),
            RendererState::Destroyed => warn!("start() on a destroyed audio renderer"),
        }
    }

    fn render_buffer(
        &self,
        _clock: Option<&dyn ClockReference>,
        data: &[u8],
        pts: u64,
    ) -> Result<RenderReport> {
        let _enter = self.span.enter();
        let mut guard = lock(&self.pipeline);
        let pipeline = guard
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Renderer destroyed".to_string()))?;

        if data.is_empty() {
            trace!("Empty buffer at pts {}, nothing to render", pts);
            return Ok(RenderReport::default());
        }
        self.stats.record_buffer();

        let max = pipeline.decoder.config().max_access_unit_bytes();
        if data.len() > max {
            self.stats.record_contract_violation();
            let e = Error::FrameContract(format!(
                "Buffer of {} bytes exceeds the {} byte access unit limit",
                data.len(),
                max
            ));
            error!("{}", e);
            return Err(e);
        }

        let mut frame = pipeline.decoder.new_frame();
        let decode_error = match self.decode_into(pipeline, data, &mut frame) {
            Ok(absorbed) => absorbed,
            Err(e) => {
                if matches!(e, Error::FrameContract(_)) {
                    self.stats.record_contract_violation();
                    error!("{}", e);
                }
                return Err(e);
            }
        };

        if let Some(dump) = pipeline.dump.as_mut() {
            if let Err(e) = dump.append(&frame) {
                warn!("PCM dump disabled: {}", e);
                pipeline.dump = None;
            }
        }

        let status = pipeline.output.write(&frame)?;
        self.settle_write(&mut pipeline.failures, &status)?;

        Ok(RenderReport {
            bytes: data.len(),
            decode_error,
            write: Some(status),
        })
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        let _enter = self.span.enter();
        let mut guard = lock(&self.volume);
        let control = guard
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Renderer destroyed".to_string()))?;

        match control.set_volume(volume) {
            Ok(VolumeOutcome::Disabled) => trace!("No volume element, ignoring volume {}", volume),
            Ok(VolumeOutcome::Applied(_)) => {}
            Err(e) => {
                error!("Failed to set volume {}: {}", volume, e);
                self.stats.record_volume_error();
                if self.policy.is_strict() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn destroy(&self) {
        let _enter = self.span.enter();
        let mut state = lock(&self.state);
        if *state == RendererState::Destroyed {
            trace!("Audio renderer already destroyed");
            return;
        }

        self.flush();

        let pipeline = lock(&self.pipeline).take();
        let mut dump = None;
        if let Some(mut pipeline) = pipeline {
            pipeline.decoder.close();
            pipeline.output.close();
            dump = pipeline.dump.take();
        }

        if let Some(mut volume) = lock(&self.volume).take() {
            volume.close();
        }

        if let Some(mut dump) = dump {
            if let Err(e) = dump.finalize() {
                warn!("Failed to finalize PCM dump: {}", e);
            }
        }

        *state = RendererState::Destroyed;
        let stats = self.stats.snapshot();
        info!(
            "Audio renderer destroyed: {} buffers, {} frames written, {} device errors",
            stats.buffers_rendered,
            stats.frames_written,
            stats.device_errors()
        );
    }
}

impl Drop for MirrorRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}
