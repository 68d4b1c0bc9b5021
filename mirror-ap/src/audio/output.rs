//! Audio output device binding
//!
//! A renderer talks to the device through two handles opened against the
//! same device name:
//! - a [`PlaybackStream`] taking blocking interleaved writes in the fixed
//!   [`StreamFormat`], with underrun recovery
//! - a [`ControlSurface`] used only to find and drive the hardware gain element
//!
//! [`AudioHost`] opens both. [`OutputBinding`] and [`VolumeControl`] hold the
//! renderer-side state and policy for each handle.

use crate::audio::types::{PcmFrame, StreamFormat};
use crate::error::{Error, Result};
use mirror_common::GainUnit;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Device used when the configuration names none
pub const DEFAULT_DEVICE: &str = "default";

/// Substring identifying the hardware gain element
pub const VOLUME_ELEMENT_PATTERN: &str = "Playback Volume";

/// Broken pipe: the device ran out of samples
pub const EPIPE: i32 = 32;

/// Stream suspended (power management)
pub const ESTRPIPE: i32 = 86;

/// Error code and message reported by the device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    /// Positive errno value
    pub errno: i32,
    pub message: String,
}

impl DeviceFault {
    pub fn new(errno: i32, message: impl Into<String>) -> Self {
        Self {
            errno: errno.abs(),
            message: message.into(),
        }
    }

    pub fn underrun() -> Self {
        Self::new(EPIPE, "Broken pipe (underrun)")
    }

    pub fn is_underrun(&self) -> bool {
        self.errno == EPIPE
    }

    pub fn is_suspended(&self) -> bool {
        self.errno == ESTRPIPE
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.message, self.errno)
    }
}

/// One entry of a device's control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlElement {
    pub numid: u32,
    pub name: String,
}

/// Opens device handles.
pub trait AudioHost: Send + Sync {
    /// Hardware acceleration family this host belongs to, if any.
    ///
    /// Used to decide whether a co-located video renderer shares a hardware
    /// context with the audio path.
    fn hardware_family(&self) -> Option<&str> {
        None
    }

    /// Open a playback stream.
    ///
    /// # Errors
    /// `DeviceOpen`
    fn open_playback(&self, device: &str) -> Result<Box<dyn PlaybackStream>>;

    /// Open the control surface of the same device.
    ///
    /// # Errors
    /// `ControlOpen`
    fn open_control(&self, device: &str) -> Result<Box<dyn ControlSurface>>;
}

/// Hardware playback stream.
pub trait PlaybackStream: Send {
    /// Apply the full format as one set.
    ///
    /// # Errors
    /// `DeviceConfig` if any parameter cannot be satisfied.
    fn configure(&mut self, format: &StreamFormat) -> Result<()>;

    /// Blocking interleaved write of `frames` frames.
    ///
    /// Returns the number of frames the device accepted.
    fn write_interleaved(
        &mut self,
        samples: &[i16],
        frames: usize,
    ) -> std::result::Result<usize, DeviceFault>;

    /// Ask the device to recover from `fault`.
    fn recover(&mut self, fault: &DeviceFault) -> std::result::Result<(), DeviceFault>;

    /// Block until queued frames have played.
    fn drain(&mut self) -> std::result::Result<(), DeviceFault>;

    fn close(&mut self) -> std::result::Result<(), DeviceFault>;
}

/// Device control plane.
pub trait ControlSurface: Send {
    /// Enumerate all control elements.
    fn elements(&self) -> std::result::Result<Vec<ControlElement>, DeviceFault>;

    /// Map a gain in hundredths of a dB to the element's raw units, rounding down.
    fn db_to_raw(&self, numid: u32, hundredths_db: i64) -> std::result::Result<i64, DeviceFault>;

    /// Write integer values to consecutive channel positions of an element.
    fn write_integer(&mut self, numid: u32, values: &[i64]) -> std::result::Result<(), DeviceFault>;

    /// Read one channel position of an element.
    fn read_integer(&self, numid: u32, channel: u32) -> std::result::Result<i64, DeviceFault>;

    fn close(&mut self) -> std::result::Result<(), DeviceFault>;
}

/// Result of writing one PCM frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// Every frame was accepted
    Complete { frames: usize },
    /// The device accepted fewer frames than requested without an error
    Partial { requested: usize, written: usize },
    /// The device accepted nothing and reported no error
    Empty { requested: usize },
    /// The write failed and the device recovered; the frame was dropped
    Recovered { fault: DeviceFault },
    /// The write failed and recovery failed too
    Failed { fault: DeviceFault, recovery: DeviceFault },
}

impl WriteStatus {
    pub fn frames_written(&self) -> usize {
        match self {
            WriteStatus::Complete { frames } => *frames,
            WriteStatus::Partial { written, .. } => *written,
            WriteStatus::Empty { .. }
            | WriteStatus::Recovered { .. }
            | WriteStatus::Failed { .. } => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteStatus::Failed { .. })
    }
}

/// Playback side of the device binding.
pub struct OutputBinding {
    stream: Option<Box<dyn PlaybackStream>>,
    format: StreamFormat,
    device: String,
}

impl OutputBinding {
    /// Open the playback stream and negotiate the fixed format.
    ///
    /// A stream that rejects the format is closed before the error returns.
    pub fn open(host: &dyn AudioHost, device: &str, format: StreamFormat) -> Result<Self> {
        let mut stream = host.open_playback(device)?;

        if let Err(e) = stream.configure(&format) {
            if let Err(fault) = stream.close() {
                warn!("Failed to close rejected stream on '{}': {}", device, fault);
            }
            return Err(e);
        }

        info!(
            "Opened playback stream on '{}': {:?} {} ch @ {} Hz, {} us buffer",
            device, format.sample_format, format.channels, format.sample_rate, format.latency_us
        );

        Ok(Self {
            stream: Some(stream),
            format,
            device: device.to_string(),
        })
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one frame, recovering once from a device error.
    ///
    /// Device errors are reported in the returned status, never as `Err`.
    ///
    /// # Errors
    /// `InvalidState` if the stream is closed.
    pub fn write(&mut self, frame: &PcmFrame) -> Result<WriteStatus> {
        let requested = self.format.bytes_to_frames(frame.byte_len());
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Playback stream already closed".to_string()))?;

        let status = match stream.write_interleaved(frame.samples(), requested) {
            Ok(0) if requested > 0 => {
                debug!("Device accepted no frames of {}", requested);
                WriteStatus::Empty { requested }
            }
            Ok(written) if written < requested => {
                error!(
                    "Expected to write {} frames, but wrote {} frames",
                    requested, written
                );
                WriteStatus::Partial { requested, written }
            }
            Ok(written) => WriteStatus::Complete { frames: written },
            Err(fault) => {
                if fault.is_underrun() {
                    warn!("Playback underrun on '{}'", self.device);
                } else {
                    warn!("Playback write failed on '{}': {}", self.device, fault);
                }
                match stream.recover(&fault) {
                    Ok(()) => {
                        debug!("Playback stream recovered from errno {}", fault.errno);
                        WriteStatus::Recovered { fault }
                    }
                    Err(recovery) => {
                        error!("Playback stream recovery failed: {}", recovery);
                        WriteStatus::Failed { fault, recovery }
                    }
                }
            }
        };

        Ok(status)
    }

    /// Drain queued frames and close the stream. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(fault) = stream.drain() {
                error!("PCM drain failed: {}", fault);
            }
            if let Err(fault) = stream.close() {
                error!("PCM close failed: {}", fault);
            }
            debug!("Playback stream on '{}' closed", self.device);
        }
    }
}

impl Drop for OutputBinding {
    fn drop(&mut self) {
        self.close();
    }
}

/// Last gain successfully written to hardware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    /// Value as passed to `set_volume`
    pub volume: f32,
    /// Hundredths of a dB handed to the device mapping
    pub hundredths_db: i64,
    /// Raw element value written to both channels
    pub raw: i64,
}

/// Result of a volume request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeOutcome {
    /// No gain element was found at open time
    Disabled,
    Applied(VolumeState),
}

/// Control side of the device binding.
///
/// Holds the volume capability for one renderer instance.
pub struct VolumeControl {
    control: Option<Box<dyn ControlSurface>>,
    element: Option<ControlElement>,
    gain_unit: GainUnit,
    last: Option<VolumeState>,
    device: String,
}

impl VolumeControl {
    /// Open the control surface and look for a gain element named by `pattern`.
    ///
    /// A missing element, or a failed enumeration, disables volume control
    /// for this instance without failing.
    ///
    /// # Errors
    /// `ControlOpen` if the control surface cannot be opened.
    pub fn open(host: &dyn AudioHost, device: &str, pattern: &str, gain_unit: GainUnit) -> Result<Self> {
        let control = host.open_control(device)?;

        let element = match control.elements() {
            Ok(elements) => Self::discover(&elements, pattern),
            Err(fault) => {
                warn!("Failed to enumerate control elements of '{}': {}", device, fault);
                None
            }
        };

        match &element {
            Some(el) => debug!("Volume element '{}' (numid {}) on '{}'", el.name, el.numid, device),
            None => info!("Cannot control volume for device '{}'", device),
        }

        Ok(Self {
            control: Some(control),
            element,
            gain_unit,
            last: None,
            device: device.to_string(),
        })
    }

    /// Find the gain element: last element whose name contains `pattern`.
    pub fn discover(elements: &[ControlElement], pattern: &str) -> Option<ControlElement> {
        elements
            .iter()
            .rev()
            .find(|el| el.name.contains(pattern))
            .cloned()
    }

    pub fn has_volume(&self) -> bool {
        self.control.is_some() && self.element.is_some()
    }

    pub fn element(&self) -> Option<&ControlElement> {
        self.element.as_ref()
    }

    pub fn gain_unit(&self) -> GainUnit {
        self.gain_unit
    }

    pub fn last_applied(&self) -> Option<VolumeState> {
        self.last
    }

    /// Convert `volume` to raw gain and write it to both channels.
    ///
    /// # Errors
    /// - `VolumeConvert` if the value or the device mapping fails
    /// - `VolumeWrite` if the element write fails
    pub fn set_volume(&mut self, volume: f32) -> Result<VolumeOutcome> {
        let (control, element) = match (self.control.as_mut(), self.element.as_ref()) {
            (Some(control), Some(element)) => (control, element),
            _ => return Ok(VolumeOutcome::Disabled),
        };

        let hundredths_db = self
            .gain_unit
            .to_hundredths_db(volume)
            .map_err(|e| Error::VolumeConvert(e.to_string()))?;

        let raw = control
            .db_to_raw(element.numid, hundredths_db)
            .map_err(|fault| Error::VolumeConvert(fault.to_string()))?;

        control
            .write_integer(element.numid, &[raw, raw])
            .map_err(|fault| Error::VolumeWrite(fault.to_string()))?;

        let state = VolumeState {
            volume,
            hundredths_db,
            raw,
        };
        debug!(
            "Volume {} -> {} (1/100 dB) -> raw {} on '{}'",
            volume, hundredths_db, raw, self.device
        );
        self.last = Some(state);
        Ok(VolumeOutcome::Applied(state))
    }

    /// Read back the gain element's left and right raw values.
    pub fn read_back(&self) -> Result<Option<(i64, i64)>> {
        let (control, element) = match (self.control.as_ref(), self.element.as_ref()) {
            (Some(control), Some(element)) => (control, element),
            _ => return Ok(None),
        };

        let read = |channel| {
            control
                .read_integer(element.numid, channel)
                .map_err(|fault| Error::VolumeWrite(format!("Read-back failed: {}", fault)))
        };
        Ok(Some((read(0)?, read(1)?)))
    }

    /// Close the control surface. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut control) = self.control.take() {
            if let Err(fault) = control.close() {
                error!("Control surface close failed: {}", fault);
            }
            debug!("Control surface of '{}' closed", self.device);
        }
    }
}

impl Drop for VolumeControl {
    fn drop(&mut self) {
        self.close();
    }
}
