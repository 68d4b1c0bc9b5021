//! Bootstrap configuration for mirror-ap
//!
//! One TOML file with a `[logging]` and a `[renderer]` section, both optional.
//! Command-line flags are applied on top by the binary.

use crate::audio::asc::{AudioSpecificConfig, ELD_STEREO_44100_480};
use crate::audio::output::{DEFAULT_DEVICE, VOLUME_ELEMENT_PATTERN};
use crate::audio::DecoderKind;
use crate::error::{Error, Result};
use crate::renderer::ErrorPolicy;
use mirror_common::config::{load_or_default, resolve_config_path, LoggingConfig};
use mirror_common::GainUnit;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MIRROR_AP_CONFIG";

/// Whole config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub renderer: RendererConfig,
}

impl BootstrapConfig {
    /// Resolve and load the config file, or fall back to defaults.
    ///
    /// # Arguments
    /// - `cli_path`: `--config` value, if given
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        let config: BootstrapConfig = load_or_default(path.as_deref())?;
        config.renderer.validate()?;
        Ok(config)
    }
}

/// `[renderer]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Output device name; empty means the system default
    pub device: String,

    pub error_policy: ErrorPolicy,

    /// Failed writes in a row before the device counts as lost
    pub max_consecutive_failures: Option<u32>,

    pub gain_unit: GainUnit,

    /// Substring identifying the hardware gain element
    pub volume_element: String,

    /// Raw stream configuration as hex
    pub codec_config: String,

    pub decoder: DecoderKind,

    /// Append decoded frames to this WAV file
    pub dump_pcm: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            error_policy: ErrorPolicy::default(),
            max_consecutive_failures: None,
            gain_unit: GainUnit::default(),
            volume_element: VOLUME_ELEMENT_PATTERN.to_string(),
            codec_config: hex::encode(ELD_STEREO_44100_480),
            decoder: DecoderKind::default(),
            dump_pcm: None,
        }
    }
}

impl RendererConfig {
    /// Device to open, falling back to [`DEFAULT_DEVICE`].
    pub fn device_name(&self) -> &str {
        let device = self.device.trim();
        if device.is_empty() {
            DEFAULT_DEVICE
        } else {
            device
        }
    }

    /// Decode and parse `codec_config`.
    ///
    /// # Errors
    /// `Config` if the value is not hex or not a supported configuration.
    pub fn audio_specific_config(&self) -> Result<AudioSpecificConfig> {
        let raw = hex::decode(self.codec_config.trim()).map_err(|e| {
            Error::Config(format!("codec_config '{}' is not valid hex: {}", self.codec_config, e))
        })?;
        AudioSpecificConfig::parse(&raw)
            .map_err(|e| Error::Config(format!("codec_config '{}': {}", self.codec_config, e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.volume_element.is_empty() {
            return Err(Error::Config("volume_element must not be empty".to_string()));
        }
        self.audio_specific_config()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::asc::AOT_ER_AAC_ELD;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.device_name(), "default");
        assert_eq!(config.codec_config, "f8e85000");
        assert_eq!(config.error_policy, ErrorPolicy::Tolerant);
        assert_eq!(config.gain_unit, GainUnit::Decibel);

        let asc = config.audio_specific_config().unwrap();
        assert_eq!(asc.object_type(), AOT_ER_AAC_ELD);
        assert_eq!(asc.frame_length(), 480);
    }

    #[test]
    fn test_blank_device_uses_default() {
        let config = RendererConfig {
            device: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.device_name(), DEFAULT_DEVICE);
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
[logging]
level = "debug"

[renderer]
device = "hw:1,0"
error_policy = "strict"
max_consecutive_failures = 5
gain_unit = "legacy-doubled"
volume_element = "PCM Playback Volume"
decoder = "symphonia"
codec_config = "1210"
dump_pcm = "/tmp/out.wav"
"#,
        );

        let config = BootstrapConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        let r = &config.renderer;
        assert_eq!(r.device_name(), "hw:1,0");
        assert_eq!(r.error_policy, ErrorPolicy::Strict);
        assert_eq!(r.max_consecutive_failures, Some(5));
        assert_eq!(r.gain_unit, GainUnit::LegacyDoubled);
        assert_eq!(r.volume_element, "PCM Playback Volume");
        assert_eq!(r.decoder, DecoderKind::Symphonia);
        assert_eq!(r.dump_pcm.as_deref(), Some(Path::new("/tmp/out.wav")));
        assert_eq!(r.audio_specific_config().unwrap().frame_length(), 1024);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let file = write_config("[renderer]\ndevice = \"plughw:0\"\n");
        let config = BootstrapConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.renderer.device_name(), "plughw:0");
        assert_eq!(config.renderer.volume_element, VOLUME_ELEMENT_PATTERN);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_hex_rejected() {
        let file = write_config("[renderer]\ncodec_config = \"zz\"\n");
        assert!(matches!(
            BootstrapConfig::load(Some(file.path())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let file = write_config("[renderer]\nerror_policy = \"lenient\"\n");
        assert!(BootstrapConfig::load(Some(file.path())).is_err());
    }
}
