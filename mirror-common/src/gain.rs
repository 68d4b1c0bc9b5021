//! Volume value to hardware gain unit conversion
//!
//! Sender volume arrives as a signed float (0.0 is full scale, more negative is
//! quieter, -144.0 conventionally means mute). Hardware mixers take their dB
//! argument in hundredths of a dB. [`GainUnit`] names how the incoming float
//! is interpreted before it reaches the mixer's own dB-to-raw mapping.

use crate::{Error, Result};
use serde::Deserialize;

/// Hundredths of a dB per dB
pub const HUNDREDTHS_PER_DB: i64 = 100;

/// Multiplier applied by [`GainUnit::LegacyDoubled`]
pub const LEGACY_MULTIPLIER: i64 = 200;

/// Interpretation of the volume value handed to `set_volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GainUnit {
    /// Value is in dB; converted to hundredths of a dB with rounding.
    #[default]
    Decibel,

    /// Value is truncated to a whole number, then multiplied by 200.
    ///
    /// Reproduces the receiver arithmetic older deployments were tuned
    /// against; one input step lands on two dB at the mixer.
    LegacyDoubled,
}

impl GainUnit {
    /// Convert a volume value into hundredths of a dB.
    ///
    /// # Errors
    /// `InvalidInput` for NaN or infinite values.
    pub fn to_hundredths_db(self, value: f32) -> Result<i64> {
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!("Volume {} is not finite", value)));
        }

        let converted = match self {
            GainUnit::Decibel => (f64::from(value) * HUNDREDTHS_PER_DB as f64).round() as i64,
            GainUnit::LegacyDoubled => (value.trunc() as i64) * LEGACY_MULTIPLIER,
        };
        Ok(converted)
    }

    /// Name as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            GainUnit::Decibel => "decibel",
            GainUnit::LegacyDoubled => "legacy-doubled",
        }
    }
}

impl std::str::FromStr for GainUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "decibel" | "db" => Ok(GainUnit::Decibel),
            "legacy-doubled" => Ok(GainUnit::LegacyDoubled),
            other => Err(Error::InvalidInput(format!("Unknown gain unit '{}'", other))),
        }
    }
}
