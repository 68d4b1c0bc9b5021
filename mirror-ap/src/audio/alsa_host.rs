//! ALSA device backend
//!
//! PCM playback through `snd_pcm` with blocking interleaved writes, and gain
//! control through the card's `snd_ctl` element list.

use crate::audio::output::{AudioHost, ControlElement, ControlSurface, DeviceFault, PlaybackStream};
use crate::audio::types::{SampleFormat, StreamFormat};
use crate::error::{Error, Result};
use alsa::ctl::{Ctl, ElemId, ElemIface, ElemType, ElemValue};
use alsa::device_name::HintIter;
use alsa::mixer::MilliBel;
use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, Round, ValueOr};
use tracing::debug;

const EBADF: i32 = 9;
const EINVAL: i32 = 22;
const ERANGE: i32 = 34;

fn fault(e: alsa::Error) -> DeviceFault {
    DeviceFault::new(e.errno(), e.to_string())
}

/// A PCM device hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHint {
    pub name: String,
    pub description: Option<String>,
}

/// Opens ALSA PCM and control handles.
#[derive(Debug, Default, Clone)]
pub struct AlsaHost {
    family: Option<String>,
}

impl AlsaHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the hardware family (for example "rpi") this host runs on.
    pub fn with_hardware_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// List PCM devices usable for playback.
    pub fn list_devices() -> Result<Vec<DeviceHint>> {
        let hints = HintIter::new_str(None, "pcm")
            .map_err(|e| Error::Config(format!("Failed to enumerate devices: {}", e)))?;

        let devices: Vec<DeviceHint> = hints
            .filter(|hint| matches!(hint.direction, None | Some(Direction::Playback)))
            .filter_map(|hint| {
                hint.name.map(|name| DeviceHint {
                    name,
                    description: hint.desc,
                })
            })
            .collect();

        debug!("Found {} playback devices", devices.len());
        Ok(devices)
    }
}

impl AudioHost for AlsaHost {
    fn hardware_family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn open_playback(&self, device: &str) -> Result<Box<dyn PlaybackStream>> {
        let pcm = PCM::new(device, Direction::Playback, false).map_err(|e| Error::DeviceOpen {
            device: device.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(AlsaPlayback {
            pcm: Some(pcm),
            device: device.to_string(),
            channels: StreamFormat::MIRROR.channels as usize,
        }))
    }

    fn open_control(&self, device: &str) -> Result<Box<dyn ControlSurface>> {
        let ctl = Ctl::new(device, false).map_err(|e| Error::ControlOpen {
            device: device.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(AlsaControl { ctl: Some(ctl) }))
    }
}

struct AlsaPlayback {
    pcm: Option<PCM>,
    device: String,
    channels: usize,
}

impl AlsaPlayback {
    fn pcm(&self) -> std::result::Result<&PCM, DeviceFault> {
        self.pcm
            .as_ref()
            .ok_or_else(|| DeviceFault::new(EBADF, "PCM handle closed"))
    }
}

impl PlaybackStream for AlsaPlayback {
    fn configure(&mut self, format: &StreamFormat) -> Result<()> {
        let device = self.device.clone();
        let config_err = |e: alsa::Error| Error::DeviceConfig {
            device: device.clone(),
            reason: e.to_string(),
        };
        let pcm = self.pcm.as_ref().ok_or_else(|| Error::DeviceConfig {
            device: device.clone(),
            reason: "PCM handle closed".to_string(),
        })?;

        let alsa_format = match format.sample_format {
            SampleFormat::S16Le => Format::S16LE,
        };

        {
            let hwp = HwParams::any(pcm).map_err(config_err)?;
            hwp.set_access(Access::RWInterleaved).map_err(config_err)?;
            hwp.set_format(alsa_format).map_err(config_err)?;
            hwp.set_channels(format.channels as u32).map_err(config_err)?;
            hwp.set_rate_resample(format.soft_resample).map_err(config_err)?;
            hwp.set_rate(format.sample_rate, ValueOr::Nearest).map_err(config_err)?;
            hwp.set_buffer_time_near(format.latency_us, ValueOr::Nearest)
                .map_err(config_err)?;
            hwp.set_period_time_near(format.period_us(), ValueOr::Nearest)
                .map_err(config_err)?;
            pcm.hw_params(&hwp).map_err(config_err)?;
        }

        let hwp = pcm.hw_params_current().map_err(config_err)?;
        let rate = hwp.get_rate().map_err(config_err)?;
        if rate != format.sample_rate {
            return Err(Error::DeviceConfig {
                device: device.clone(),
                reason: format!("Negotiated rate {} Hz, required {} Hz", rate, format.sample_rate),
            });
        }
        let buffer_size = hwp.get_buffer_size().map_err(config_err)?;
        let period_size = hwp.get_period_size().map_err(config_err)?;

        // Start once the buffer is nearly full; wake writers every period
        let swp = pcm.sw_params_current().map_err(config_err)?;
        swp.set_start_threshold(buffer_size - period_size)
            .map_err(config_err)?;
        swp.set_avail_min(period_size).map_err(config_err)?;
        pcm.sw_params(&swp).map_err(config_err)?;

        self.channels = format.channels as usize;
        debug!(
            "ALSA params on '{}': rate={} buffer={} frames period={} frames",
            device, rate, buffer_size, period_size
        );
        Ok(())
    }

    fn write_interleaved(
        &mut self,
        samples: &[i16],
        frames: usize,
    ) -> std::result::Result<usize, DeviceFault> {
        let pcm = self.pcm()?;
        let io = pcm.io_i16().map_err(fault)?;
        let end = (frames * self.channels).min(samples.len());
        io.writei(&samples[..end]).map_err(fault)
    }

    fn recover(&mut self, fault_in: &DeviceFault) -> std::result::Result<(), DeviceFault> {
        self.pcm()?.recover(fault_in.errno, false).map_err(fault)
    }

    fn drain(&mut self) -> std::result::Result<(), DeviceFault> {
        self.pcm()?.drain().map_err(fault)
    }

    fn close(&mut self) -> std::result::Result<(), DeviceFault> {
        // snd_pcm_close runs when the handle drops
        self.pcm.take();
        Ok(())
    }
}

struct AlsaControl {
    ctl: Option<Ctl>,
}

impl AlsaControl {
    fn ctl(&self) -> std::result::Result<&Ctl, DeviceFault> {
        self.ctl
            .as_ref()
            .ok_or_else(|| DeviceFault::new(EBADF, "Control handle closed"))
    }

    fn elem_id(numid: u32) -> ElemId {
        let mut id = ElemId::new(ElemIface::Mixer);
        id.set_numid(numid);
        id
    }
}

impl ControlSurface for AlsaControl {
    fn elements(&self) -> std::result::Result<Vec<ControlElement>, DeviceFault> {
        let list = self.ctl()?.elem_list().map_err(fault)?;

        (0..list.get_used())
            .map(|index| {
                Ok(ControlElement {
                    numid: list.get_numid(index).map_err(fault)?,
                    name: list.get_name(index).map_err(fault)?.to_string(),
                })
            })
            .collect()
    }

    fn db_to_raw(&self, numid: u32, hundredths_db: i64) -> std::result::Result<i64, DeviceFault> {
        self.ctl()?
            .convert_from_db(&Self::elem_id(numid), MilliBel(hundredths_db), Round::Floor)
            .map_err(fault)
    }

    fn write_integer(&mut self, numid: u32, values: &[i64]) -> std::result::Result<(), DeviceFault> {
        let ctl = self.ctl()?;
        let mut value = ElemValue::new(ElemType::Integer).map_err(fault)?;
        value.set_id(&Self::elem_id(numid));
        for (channel, raw) in values.iter().enumerate() {
            let raw = i32::try_from(*raw)
                .map_err(|_| DeviceFault::new(ERANGE, format!("Raw gain {} out of range", raw)))?;
            value
                .set_integer(channel as u32, raw)
                .ok_or_else(|| DeviceFault::new(EINVAL, format!("Channel {} not writable", channel)))?;
        }
        ctl.elem_write(&value).map_err(fault)
    }

    fn read_integer(&self, numid: u32, channel: u32) -> std::result::Result<i64, DeviceFault> {
        let ctl = self.ctl()?;
        let mut value = ElemValue::new(ElemType::Integer).map_err(fault)?;
        value.set_id(&Self::elem_id(numid));
        ctl.elem_read(&mut value).map_err(fault)?;
        value
            .get_integer(channel)
            .map(i64::from)
            .ok_or_else(|| DeviceFault::new(EINVAL, format!("Channel {} not readable", channel)))
    }

    fn close(&mut self) -> std::result::Result<(), DeviceFault> {
        self.ctl.take();
        Ok(())
    }
}
