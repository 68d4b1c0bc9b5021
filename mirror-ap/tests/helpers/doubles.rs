//! Scripted test doubles for the codec and device seams
//!
//! Every double reports into a shared [`CallProbe`]: live-handle counters
//! for leak checks, per-call counters, and an ordered event log for
//! teardown ordering. Device writes and recoveries follow scripts queued on
//! the probe; an empty script means success.

use mirror_ap::audio::asc::AudioSpecificConfig;
use mirror_ap::audio::decoder::{CodecBackend, FrameDecoder, StreamInfo};
use mirror_ap::audio::output::{
    AudioHost, ControlElement, ControlSurface, DeviceFault, PlaybackStream,
};
use mirror_ap::audio::types::StreamFormat;
use mirror_ap::config::RendererConfig;
use mirror_ap::error::{Error, Result};
use mirror_ap::renderer::{MirrorRenderer, VideoRenderer};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// numid of the gain element in [`volume_elements`]
pub const VOLUME_NUMID: u32 = 7;

/// A control list with two matching elements; the later one must win.
pub fn volume_elements() -> Vec<ControlElement> {
    vec![
        ControlElement { numid: 1, name: "Master Playback Switch".to_string() },
        ControlElement { numid: 2, name: "Headphone Playback Volume".to_string() },
        ControlElement { numid: 5, name: "Capture Volume".to_string() },
        ControlElement { numid: VOLUME_NUMID, name: "PCM Playback Volume".to_string() },
        ControlElement { numid: 9, name: "Mic Boost".to_string() },
    ]
}

/// Outcome of one scripted device write
#[derive(Debug, Clone)]
pub enum ScriptedWrite {
    Accept,
    /// Accept only this many frames
    Short(usize),
    Fail(DeviceFault),
    /// Block inside the write until the gate is released, then accept
    Park(Arc<WriteGate>),
}

/// Holds a device write open until the test releases it.
#[derive(Debug, Default)]
pub struct WriteGate {
    /// (write entered, write released)
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl WriteGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block until a write has parked on this gate
    pub fn wait_entered(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.0 {
            state = self.changed.wait(state).unwrap();
        }
    }

    pub fn release(&self) {
        self.state.lock().unwrap().1 = true;
        self.changed.notify_all();
    }

    fn park(&self) {
        let mut state = self.state.lock().unwrap();
        state.0 = true;
        self.changed.notify_all();
        while !state.1 {
            state = self.changed.wait(state).unwrap();
        }
    }
}

/// Shared observation point for all doubles.
#[derive(Default)]
pub struct CallProbe {
    /// Decoders allocated minus decoders closed
    pub decoders_live: AtomicI64,
    pub decoder_opens: AtomicUsize,
    pub fills: AtomicUsize,
    pub decodes: AtomicUsize,

    /// Playback streams opened minus closed
    pub streams_live: AtomicI64,
    /// Control surfaces opened minus closed
    pub controls_live: AtomicI64,

    pub write_calls: AtomicUsize,
    /// (frames requested, samples handed over) per write call
    pub writes: Mutex<Vec<(usize, usize)>>,
    /// errno of every recover call
    pub recovers: Mutex<Vec<i32>>,
    pub drains: AtomicUsize,

    /// (numid, values) of every control write
    pub control_writes: Mutex<Vec<(u32, Vec<i64>)>>,
    /// Current element values, by numid
    pub control_values: Mutex<HashMap<u32, Vec<i64>>>,

    pub write_script: Mutex<VecDeque<ScriptedWrite>>,
    /// `false` entries make the matching recover call fail
    pub recover_script: Mutex<VecDeque<bool>>,

    /// Lifecycle events in call order
    pub events: Mutex<Vec<&'static str>>,
}

impl CallProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn event(&self, name: &'static str) {
        self.events.lock().unwrap().push(name);
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn script_writes(&self, writes: impl IntoIterator<Item = ScriptedWrite>) {
        self.write_script.lock().unwrap().extend(writes);
    }

    pub fn script_recovers(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.recover_script.lock().unwrap().extend(outcomes);
    }

    pub fn writes(&self) -> Vec<(usize, usize)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn recovers(&self) -> Vec<i32> {
        self.recovers.lock().unwrap().clone()
    }

    pub fn control_writes(&self) -> Vec<(u32, Vec<i64>)> {
        self.control_writes.lock().unwrap().clone()
    }

    /// Nothing left open
    pub fn all_released(&self) -> bool {
        self.decoders_live.load(Ordering::SeqCst) == 0
            && self.streams_live.load(Ordering::SeqCst) == 0
            && self.controls_live.load(Ordering::SeqCst) == 0
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Codec backend double.
pub struct MockCodec {
    pub probe: Arc<CallProbe>,
    pub fail_open: bool,
    pub reject_config: bool,
    pub fail_fill: bool,
    pub fail_decode: bool,
    /// Samples to report per decode; `None` fills the whole frame
    pub produce: Option<usize>,
}

impl MockCodec {
    pub fn new(probe: Arc<CallProbe>) -> Self {
        Self {
            probe,
            fail_open: false,
            reject_config: false,
            fail_fill: false,
            fail_decode: false,
            produce: None,
        }
    }
}

impl CodecBackend for MockCodec {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self) -> Result<Box<dyn FrameDecoder>> {
        if self.fail_open {
            return Err(Error::DecoderInit("mock allocation failure".to_string()));
        }
        self.probe.decoder_opens.fetch_add(1, Ordering::SeqCst);
        self.probe.decoders_live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder {
            probe: Arc::clone(&self.probe),
            reject_config: self.reject_config,
            fail_fill: self.fail_fill,
            fail_decode: self.fail_decode,
            produce: self.produce,
            frame_length: 0,
            closed: false,
        }))
    }
}

struct MockDecoder {
    probe: Arc<CallProbe>,
    reject_config: bool,
    fail_fill: bool,
    fail_decode: bool,
    produce: Option<usize>,
    frame_length: u32,
    closed: bool,
}

impl FrameDecoder for MockDecoder {
    fn configure_raw(&mut self, config: &AudioSpecificConfig) -> Result<()> {
        if self.reject_config {
            return Err(Error::DecoderConfig("mock rejects configuration".to_string()));
        }
        self.frame_length = config.frame_length();
        Ok(())
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        Some(StreamInfo {
            channels: 2,
            sample_rate: 44100,
            samples_per_frame: self.frame_length,
            object_type: 39,
            bitrate: 0,
        })
    }

    fn fill(&mut self, data: &[u8]) -> Result<usize> {
        self.probe.fills.fetch_add(1, Ordering::SeqCst);
        if self.fail_fill {
            return Err(Error::DecodeFill("mock fill failure".to_string()));
        }
        Ok(data.len())
    }

    fn decode_frame(&mut self, pcm: &mut [i16]) -> Result<usize> {
        self.probe.decodes.fetch_add(1, Ordering::SeqCst);
        if self.fail_decode {
            return Err(Error::DecodeFrame("mock decode failure".to_string()));
        }
        let produced = self.produce.unwrap_or(pcm.len()).min(pcm.len());
        for (i, sample) in pcm.iter_mut().take(produced).enumerate() {
            *sample = (i % 100) as i16 + 1;
        }
        Ok(self.produce.unwrap_or(produced))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.decoders_live.fetch_sub(1, Ordering::SeqCst);
            self.probe.event("decoder_close");
        }
    }
}

// ============================================================================
// Device
// ============================================================================

/// Audio host double.
pub struct MockHost {
    pub probe: Arc<CallProbe>,
    pub family: Option<String>,
    pub fail_playback_open: bool,
    pub reject_format: bool,
    pub fail_control_open: bool,
    pub fail_enumerate: bool,
    pub elements: Vec<ControlElement>,
    /// Last device name opened
    pub opened_device: Mutex<Option<String>>,
}

impl MockHost {
    pub fn new(probe: Arc<CallProbe>) -> Self {
        Self {
            probe,
            family: None,
            fail_playback_open: false,
            reject_format: false,
            fail_control_open: false,
            fail_enumerate: false,
            elements: volume_elements(),
            opened_device: Mutex::new(None),
        }
    }
}

impl AudioHost for MockHost {
    fn hardware_family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn open_playback(&self, device: &str) -> Result<Box<dyn PlaybackStream>> {
        if self.fail_playback_open {
            return Err(Error::DeviceOpen {
                device: device.to_string(),
                reason: "No such device".to_string(),
            });
        }
        *self.opened_device.lock().unwrap() = Some(device.to_string());
        self.probe.streams_live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            probe: Arc::clone(&self.probe),
            reject_format: self.reject_format,
            device: device.to_string(),
            closed: false,
        }))
    }

    fn open_control(&self, device: &str) -> Result<Box<dyn ControlSurface>> {
        if self.fail_control_open {
            return Err(Error::ControlOpen {
                device: device.to_string(),
                reason: "Permission denied".to_string(),
            });
        }
        self.probe.controls_live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockControl {
            probe: Arc::clone(&self.probe),
            elements: self.elements.clone(),
            fail_enumerate: self.fail_enumerate,
            closed: false,
        }))
    }
}

struct MockStream {
    probe: Arc<CallProbe>,
    reject_format: bool,
    device: String,
    closed: bool,
}

impl PlaybackStream for MockStream {
    fn configure(&mut self, format: &StreamFormat) -> Result<()> {
        if self.reject_format {
            return Err(Error::DeviceConfig {
                device: self.device.clone(),
                reason: format!("{} Hz not supported", format.sample_rate),
            });
        }
        Ok(())
    }

    fn write_interleaved(
        &mut self,
        samples: &[i16],
        frames: usize,
    ) -> std::result::Result<usize, DeviceFault> {
        self.probe.write_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.writes.lock().unwrap().push((frames, samples.len()));
        let scripted = self.probe.write_script.lock().unwrap().pop_front();
        match scripted.unwrap_or(ScriptedWrite::Accept) {
            ScriptedWrite::Accept => Ok(frames),
            ScriptedWrite::Short(n) => Ok(n.min(frames)),
            ScriptedWrite::Fail(fault) => Err(fault),
            ScriptedWrite::Park(gate) => {
                gate.park();
                Ok(frames)
            }
        }
    }

    fn recover(&mut self, fault: &DeviceFault) -> std::result::Result<(), DeviceFault> {
        self.probe.recovers.lock().unwrap().push(fault.errno);
        let ok = self.probe.recover_script.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(())
        } else {
            Err(DeviceFault::new(fault.errno, "mock recovery failure"))
        }
    }

    fn drain(&mut self) -> std::result::Result<(), DeviceFault> {
        self.probe.drains.fetch_add(1, Ordering::SeqCst);
        self.probe.event("stream_drain");
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), DeviceFault> {
        if !self.closed {
            self.closed = true;
            self.probe.streams_live.fetch_sub(1, Ordering::SeqCst);
            self.probe.event("stream_close");
        }
        Ok(())
    }
}

struct MockControl {
    probe: Arc<CallProbe>,
    elements: Vec<ControlElement>,
    fail_enumerate: bool,
    closed: bool,
}

impl ControlSurface for MockControl {
    fn elements(&self) -> std::result::Result<Vec<ControlElement>, DeviceFault> {
        if self.fail_enumerate {
            return Err(DeviceFault::new(5, "Input/output error"));
        }
        Ok(self.elements.clone())
    }

    /// Linear 1 raw step per dB, 0 at -100 dB, floored.
    fn db_to_raw(&self, _numid: u32, hundredths_db: i64) -> std::result::Result<i64, DeviceFault> {
        Ok((hundredths_db.div_euclid(100) + 100).clamp(0, 100))
    }

    fn write_integer(&mut self, numid: u32, values: &[i64]) -> std::result::Result<(), DeviceFault> {
        self.probe.control_writes.lock().unwrap().push((numid, values.to_vec()));
        self.probe.control_values.lock().unwrap().insert(numid, values.to_vec());
        Ok(())
    }

    fn read_integer(&self, numid: u32, channel: u32) -> std::result::Result<i64, DeviceFault> {
        self.probe
            .control_values
            .lock()
            .unwrap()
            .get(&numid)
            .and_then(|values| values.get(channel as usize).copied())
            .ok_or_else(|| DeviceFault::new(22, "Invalid argument"))
    }

    fn close(&mut self) -> std::result::Result<(), DeviceFault> {
        if !self.closed {
            self.closed = true;
            self.probe.controls_live.fetch_sub(1, Ordering::SeqCst);
            self.probe.event("control_close");
        }
        Ok(())
    }
}

// ============================================================================
// Video
// ============================================================================

/// Video renderer double on a fixed hardware family.
pub struct MockVideo {
    pub family: String,
}

impl VideoRenderer for MockVideo {
    fn shares_hardware_family(&self, family: &str) -> bool {
        self.family == family
    }
}

// ============================================================================
// Rig
// ============================================================================

/// Codec + host doubles sharing one probe.
pub struct Rig {
    pub probe: Arc<CallProbe>,
    pub codec: MockCodec,
    pub host: MockHost,
}

impl Rig {
    pub fn new() -> Self {
        let probe = CallProbe::new();
        Self {
            codec: MockCodec::new(Arc::clone(&probe)),
            host: MockHost::new(Arc::clone(&probe)),
            probe,
        }
    }

    pub fn renderer(&self, config: &RendererConfig) -> Result<MirrorRenderer> {
        MirrorRenderer::with_backends(&self.codec, &self.host, config, None)
    }

    pub fn renderer_with_video(
        &self,
        config: &RendererConfig,
        video: Arc<dyn VideoRenderer>,
    ) -> Result<MirrorRenderer> {
        MirrorRenderer::with_backends(&self.codec, &self.host, config, Some(video))
    }

    /// Renderer on default configuration
    pub fn default_renderer(&self) -> MirrorRenderer {
        self.renderer(&RendererConfig::default())
            .expect("Failed to create renderer on mock backends")
    }
}
