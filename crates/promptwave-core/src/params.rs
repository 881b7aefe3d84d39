//! Generation parameters.
//!
//! Every field is bounded independently. Values outside their range are
//! clamped; non-finite values are ignored so a bad knob reading can never
//! poison the current set.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Tempo range in beats per minute.
pub const TEMPO_RANGE: RangeInclusive<f32> = 60.0..=200.0;
/// Guidance range (adherence of the generator to the prompts).
pub const GUIDANCE_RANGE: RangeInclusive<f32> = 0.0..=6.0;
/// Note density range.
pub const DENSITY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Tonal brightness range.
pub const BRIGHTNESS_RANGE: RangeInclusive<f32> = 0.0..=1.0;

fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    value.clamp(*range.start(), *range.end())
}

/// Current generation parameters. Last write wins; no history is kept.
///
/// ## Parameters
///
/// - `tempo_bpm`: 60.0 to 200.0 (default 120.0)
/// - `guidance`: 0.0 to 6.0 (default 4.0)
/// - `density`: 0.0 to 1.0 (default 0.5)
/// - `brightness`: 0.0 to 1.0 (default 0.5)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    tempo_bpm: f32,
    guidance: f32,
    density: f32,
    brightness: f32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            guidance: 4.0,
            density: 0.5,
            brightness: 0.5,
        }
    }
}

/// Result of merging an update into a [`ParameterSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    /// The merged parameters.
    pub parameters: ParameterSet,
    /// Whether the tempo value actually changed.
    pub tempo_changed: bool,
}

impl ParameterSet {
    /// Tempo in beats per minute.
    pub fn tempo_bpm(&self) -> f32 {
        self.tempo_bpm
    }

    /// Guidance strength.
    pub fn guidance(&self) -> f32 {
        self.guidance
    }

    /// Note density.
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Tonal brightness.
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Merge a partial update, returning the new set.
    ///
    /// # Example
    ///
    /// ```rust
    /// use promptwave_core::{ParameterSet, ParameterUpdate};
    ///
    /// let change = ParameterSet::default().merge(&ParameterUpdate {
    ///     tempo_bpm: Some(500.0),
    ///     density: Some(0.9),
    ///     ..Default::default()
    /// });
    /// assert_eq!(change.parameters.tempo_bpm(), 200.0);
    /// assert_eq!(change.parameters.density(), 0.9);
    /// assert!(change.tempo_changed);
    /// ```
    pub fn merge(&self, update: &ParameterUpdate) -> ParameterChange {
        let pick = |current: f32, incoming: Option<f32>, range: &RangeInclusive<f32>| {
            match incoming {
                Some(v) if v.is_finite() => clamp_to(v, range),
                _ => current,
            }
        };

        let parameters = Self {
            tempo_bpm: pick(self.tempo_bpm, update.tempo_bpm, &TEMPO_RANGE),
            guidance: pick(self.guidance, update.guidance, &GUIDANCE_RANGE),
            density: pick(self.density, update.density, &DENSITY_RANGE),
            brightness: pick(self.brightness, update.brightness, &BRIGHTNESS_RANGE),
        };

        ParameterChange {
            tempo_changed: parameters.tempo_bpm != self.tempo_bpm,
            parameters,
        }
    }

    /// The full set expressed as an update, e.g. for persisting.
    pub fn to_update(&self) -> ParameterUpdate {
        ParameterUpdate {
            tempo_bpm: Some(self.tempo_bpm),
            guidance: Some(self.guidance),
            density: Some(self.density),
            brightness: Some(self.brightness),
        }
    }
}

/// A partial parameter update. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// New tempo in bpm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_bpm: Option<f32>,
    /// New guidance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<f32>,
    /// New density.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f32>,
    /// New brightness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
}

impl ParameterUpdate {
    /// An update that only changes tempo.
    pub fn tempo(bpm: f32) -> Self {
        Self {
            tempo_bpm: Some(bpm),
            ..Self::default()
        }
    }

    /// Whether the update carries no values.
    pub fn is_empty(&self) -> bool {
        self.tempo_bpm.is_none()
            && self.guidance.is_none()
            && self.density.is_none()
            && self.brightness.is_none()
    }
}
