//! Generated lighting effects.
//!
//! Each effect is a cancellable loop that repeatedly computes a next
//! color/brightness and submits it through the
//! [`LedController`](crate::controller::LedController) at an
//! effect-specific cadence. The [`supervisor`] guarantees at most one
//! effect is alive at any instant.

pub mod engine;
pub mod palette;
pub mod supervisor;

use serde::{Deserialize, Serialize};

use crate::{color::Rgb, error::CommandError};

/// A requested effect with its parameters.
///
/// Deserialized from the control surface's JSON parameters; absent color
/// parameters mean "use the current device state".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum EffectSpec {
    Rainbow,
    Breathing {
        #[serde(default)]
        color: Option<Rgb>,
    },
    Strobe {
        #[serde(default)]
        color: Option<Rgb>,
    },
    Police,
    Fire,
    Aurora,
    Fade {
        #[serde(default)]
        colors: Option<Vec<Rgb>>,
        #[serde(default = "params::speed")]
        speed: f32,
        #[serde(default = "params::fade_steps")]
        steps: u32,
    },
    Wave {
        #[serde(default = "params::speed")]
        speed: f32,
    },
    Blink {
        #[serde(default)]
        color: Option<Rgb>,
        /// 0 blinks forever.
        #[serde(default = "params::blink_count")]
        count: u32,
        #[serde(default = "params::speed")]
        speed: f32,
    },
    Pomodoro {
        #[serde(default = "params::work_minutes")]
        work_minutes: u32,
        #[serde(default = "params::break_minutes")]
        break_minutes: u32,
        #[serde(default = "params::cycles")]
        cycles: u32,
    },
}

mod params {
    pub fn speed() -> f32 {
        1.0
    }

    pub fn fade_steps() -> u32 {
        50
    }

    pub fn blink_count() -> u32 {
        10
    }

    pub fn work_minutes() -> u32 {
        25
    }

    pub fn break_minutes() -> u32 {
        5
    }

    pub fn cycles() -> u32 {
        4
    }
}

impl EffectSpec {
    /// Builds a spec from an effect name plus a JSON parameter object, as
    /// received from the control surface.
    pub fn from_request(name: &str, params_json: &str) -> Result<Self, CommandError> {
        let params = if params_json.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(params_json).map_err(|e| {
                CommandError::InvalidArgument(format!("bad effect parameters: {e}"))
            })?
        };

        let serde_json::Value::Object(mut map) = params else {
            return Err(CommandError::InvalidArgument(
                "effect parameters must be a JSON object".to_string(),
            ));
        };
        map.insert(
            "effect".to_string(),
            serde_json::Value::String(name.to_lowercase()),
        );

        let spec: Self = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| CommandError::InvalidArgument(format!("unknown effect request: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Effect name for status reporting and logging.
    pub fn name(&self) -> &'static str {
        match self {
            EffectSpec::Rainbow => "rainbow",
            EffectSpec::Breathing { .. } => "breathing",
            EffectSpec::Strobe { .. } => "strobe",
            EffectSpec::Police => "police",
            EffectSpec::Fire => "fire",
            EffectSpec::Aurora => "aurora",
            EffectSpec::Fade { .. } => "fade",
            EffectSpec::Wave { .. } => "wave",
            EffectSpec::Blink { .. } => "blink",
            EffectSpec::Pomodoro { .. } => "pomodoro",
        }
    }

    pub fn validate(&self) -> Result<(), CommandError> {
        let check_speed = |speed: f32| {
            if speed.is_finite() && speed > 0.0 {
                Ok(())
            } else {
                Err(CommandError::InvalidArgument(format!(
                    "speed {speed} must be a positive number"
                )))
            }
        };

        match self {
            EffectSpec::Fade { colors, speed, steps } => {
                check_speed(*speed)?;
                if *steps == 0 {
                    return Err(CommandError::InvalidArgument(
                        "steps must be at least 1".to_string(),
                    ));
                }
                if let Some(colors) = colors {
                    if colors.is_empty() {
                        return Err(CommandError::InvalidArgument(
                            "colors must not be empty".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            EffectSpec::Wave { speed } | EffectSpec::Blink { speed, .. } => check_speed(*speed),
            EffectSpec::Pomodoro {
                work_minutes,
                cycles,
                ..
            } => {
                if *work_minutes == 0 || *cycles == 0 {
                    return Err(CommandError::InvalidArgument(
                        "work_minutes and cycles must be at least 1".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
