use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::foundation::error::{HalationError, HalationResult};

/// Magnitudes at or below this are treated as "no effect".
pub const NOOP_EPSILON: f32 = 1e-4;
/// Bloom thresholds at or above this extract nothing.
pub const BLOOM_MAX_THRESHOLD: f32 = 0.99;
/// Pixelation cells at or below this size (device pixels) are invisible.
pub const PIXELATE_MIN_SIZE: f32 = 0.5;

/// Uniform values accepted by custom filters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum UniformValue {
    Float(f32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn from_json(v: &serde_json::Value) -> HalationResult<Self> {
        serde_json::from_value(v.clone())
            .map_err(|e| HalationError::validation(format!("invalid uniform value {v}: {e}")))
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Components in declaration order, padded with zeros to four lanes.
    pub fn to_vec4(&self) -> [f32; 4] {
        match *self {
            Self::Float(v) => [v, 0.0, 0.0, 0.0],
            Self::Bool(b) => [if b { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            Self::Vec2([x, y]) => [x, y, 0.0, 0.0],
            Self::Vec3([x, y, z]) => [x, y, z, 0.0],
            Self::Vec4(v) => v,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

/// Named uniforms, ordered so that signatures and program layouts are stable.
pub type UniformMap = BTreeMap<String, UniformValue>;

/// Numeric modes of the unified color-grade pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Brightness,
    Contrast,
    Saturate,
    Grayscale,
    Sepia,
    Invert,
    HueRotate,
}

impl ColorMode {
    /// Integer selector written to the `mode` uniform.
    pub fn index(self) -> u32 {
        match self {
            Self::Brightness => 0,
            Self::Contrast => 1,
            Self::Saturate => 2,
            Self::Grayscale => 3,
            Self::Sepia => 4,
            Self::Invert => 5,
            Self::HueRotate => 6,
        }
    }

    pub fn from_index(i: u32) -> Option<Self> {
        Some(match i {
            0 => Self::Brightness,
            1 => Self::Contrast,
            2 => Self::Saturate,
            3 => Self::Grayscale,
            4 => Self::Sepia,
            5 => Self::Invert,
            6 => Self::HueRotate,
            _ => return None,
        })
    }
}

/// One post-processing operation. Immutable once built for a frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Blur {
        amount: f32,
    },
    Pixelate {
        size: f32,
    },
    Bloom {
        intensity: f32,
        threshold: f32,
    },
    Brightness {
        amount: f32,
    },
    Contrast {
        amount: f32,
    },
    Saturate {
        amount: f32,
    },
    Grayscale {
        amount: f32,
    },
    Sepia {
        amount: f32,
    },
    Invert {
        amount: f32,
    },
    HueRotate {
        angle_rad: f32,
    },
    Custom {
        name: String,
        #[serde(default)]
        uniforms: UniformMap,
    },
}

impl Effect {
    pub fn custom(name: impl Into<String>, uniforms: UniformMap) -> Self {
        Self::Custom {
            name: name.into(),
            uniforms,
        }
    }

    /// Whether this effect is a design-defined no-op and must be skipped without a pass.
    ///
    /// Non-finite magnitudes count as degenerate. Custom filters are only a no-op here when the
    /// name is blank; registry misses are resolved at dispatch.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Blur { amount } => !amount.is_finite() || *amount <= NOOP_EPSILON,
            Self::Pixelate { size } => !size.is_finite() || *size <= PIXELATE_MIN_SIZE,
            Self::Bloom {
                intensity,
                threshold,
            } => {
                !intensity.is_finite()
                    || !threshold.is_finite()
                    || *intensity <= NOOP_EPSILON
                    || *threshold >= BLOOM_MAX_THRESHOLD
            }
            Self::Brightness { amount } | Self::Contrast { amount } | Self::Saturate { amount } => {
                !amount.is_finite() || (amount - 1.0).abs() <= NOOP_EPSILON
            }
            Self::Grayscale { amount } | Self::Sepia { amount } | Self::Invert { amount } => {
                !amount.is_finite() || *amount <= NOOP_EPSILON
            }
            Self::HueRotate { angle_rad } => {
                if !angle_rad.is_finite() {
                    return true;
                }
                let wrapped = angle_rad.rem_euclid(std::f32::consts::TAU);
                wrapped <= NOOP_EPSILON || std::f32::consts::TAU - wrapped <= NOOP_EPSILON
            }
            Self::Custom { name, .. } => name.trim().is_empty(),
        }
    }

    /// Color-grade mode and parameter for the color family, `None` otherwise.
    pub fn color_grade(&self) -> Option<(ColorMode, f32)> {
        Some(match *self {
            Self::Brightness { amount } => (ColorMode::Brightness, amount),
            Self::Contrast { amount } => (ColorMode::Contrast, amount),
            Self::Saturate { amount } => (ColorMode::Saturate, amount),
            // Grayscale, sepia and invert saturate at full strength.
            Self::Grayscale { amount } => (ColorMode::Grayscale, amount.min(1.0)),
            Self::Sepia { amount } => (ColorMode::Sepia, amount.min(1.0)),
            Self::Invert { amount } => (ColorMode::Invert, amount.min(1.0)),
            Self::HueRotate { angle_rad } => (ColorMode::HueRotate, angle_rad),
            _ => return None,
        })
    }
}

/// Ordered effect list; each effect consumes the previous stage's output.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EffectChain(SmallVec<[Effect; 4]>);

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.0.push(effect);
    }

    pub fn with(mut self, effect: Effect) -> Self {
        self.push(effect);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Effect> {
        self.0.iter()
    }

    /// Effects that survive the no-op predicate, in chain order.
    pub fn active(&self) -> impl Iterator<Item = &Effect> {
        self.0.iter().filter(|e| !e.is_noop())
    }

    /// Stable content signature usable as a cache `effects_key`.
    ///
    /// No-op effects do not contribute, so chains that render identically share a key.
    pub fn signature(&self) -> String {
        let active: Vec<&Effect> = self.active().collect();
        let bytes =
            serde_json::to_vec(&active).unwrap_or_else(|_| format!("{active:?}").into_bytes());
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(&bytes))
    }

    pub fn from_json(s: &str) -> HalationResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| HalationError::validation(format!("invalid effect chain: {e}")))
    }
}

impl FromIterator<Effect> for EffectChain {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Effect>> for EffectChain {
    fn from(v: Vec<Effect>) -> Self {
        Self(SmallVec::from_vec(v))
    }
}

impl<'a> IntoIterator for &'a EffectChain {
    type Item = &'a Effect;
    type IntoIter = std::slice::Iter<'a, Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/effect.rs"]
mod tests;
