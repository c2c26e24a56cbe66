//! Colour profiles and per-pixel matching.
//!
//! A [`ColorProfile`] is an inclusive RGB box plus a semantic label. Profiles
//! are derived from a static [`ProfileTemplate`] and the active
//! [`Sensitivity`]: only the lower bound of the template's dominant channel
//! moves, so raising the sensitivity can only widen a profile.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Distance from a profile centre at which confidence reaches zero.
const CONFIDENCE_SPAN: f64 = 255.0;

/// How far the dominant channel's lower bound drops per sensitivity step.
const SENSITIVITY_STEP: i32 = 20;

/// A single 8-bit RGB sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn channel(self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    fn with_channel(mut self, channel: Channel, value: u8) -> Self {
        match channel {
            Channel::Red => self.r = value,
            Channel::Green => self.g = value,
            Channel::Blue => self.b = value,
        }
        self
    }
}

/// One of the three colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

/// Operator-facing sensitivity knob, bounded to `1..=10`.
///
/// Higher values lower the dominant-channel threshold of every profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Sensitivity(u8);

impl Sensitivity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Validate and wrap a raw sensitivity value.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(CoreError::Validation(format!(
                "sensitivity must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for Sensitivity {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sensitivity> for u8 {
    fn from(value: Sensitivity) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Static definition a [`ColorProfile`] is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTemplate {
    pub name: &'static str,
    pub label: &'static str,
    /// Channel whose lower bound follows the sensitivity.
    pub dominant: Channel,
    /// The dominant lower bound never drops below this value.
    pub base_floor: u8,
    pub min: Rgb,
    pub max: Rgb,
}

/// The three profiles used on the bench: two card colours and one board.
pub const STANDARD_TEMPLATES: [ProfileTemplate; 3] = [
    ProfileTemplate {
        name: "red",
        label: "Microchip card",
        dominant: Channel::Red,
        base_floor: 100,
        min: Rgb::new(150, 0, 0),
        max: Rgb::new(255, 100, 100),
    },
    ProfileTemplate {
        name: "green",
        label: "Custom card",
        dominant: Channel::Green,
        base_floor: 100,
        min: Rgb::new(0, 150, 0),
        max: Rgb::new(100, 255, 100),
    },
    ProfileTemplate {
        name: "blue",
        label: "STM32 board",
        dominant: Channel::Blue,
        base_floor: 100,
        min: Rgb::new(0, 0, 150),
        max: Rgb::new(100, 100, 255),
    },
];

/// A named, inclusive RGB range under one sensitivity setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorProfile {
    pub name: String,
    pub label: String,
    pub min: Rgb,
    pub max: Rgb,
}

impl ColorProfile {
    /// Derive the effective profile for `sensitivity`.
    ///
    /// `min[dominant] = max(base_floor, 255 - s * 20)`, clamped to
    /// `max[dominant]`.
    pub fn derive(template: &ProfileTemplate, sensitivity: Sensitivity) -> Self {
        let ceiling = template.max.channel(template.dominant);
        let lowered = 255 - i32::from(sensitivity.value()) * SENSITIVITY_STEP;
        let floor = lowered.max(i32::from(template.base_floor));
        let dominant_min = floor.clamp(0, i32::from(ceiling)) as u8;

        Self {
            name: template.name.to_string(),
            label: template.label.to_string(),
            min: template.min.with_channel(template.dominant, dominant_min),
            max: template.max,
        }
    }

    /// Channel-wise midpoint of the range.
    pub fn center(&self) -> (f64, f64, f64) {
        let mid = |lo: u8, hi: u8| (f64::from(lo) + f64::from(hi)) / 2.0;
        (
            mid(self.min.r, self.max.r),
            mid(self.min.g, self.max.g),
            mid(self.min.b, self.max.b),
        )
    }

    /// `true` iff every channel lies within `[min, max]` inclusive.
    pub fn matches(&self, pixel: Rgb) -> bool {
        (self.min.r..=self.max.r).contains(&pixel.r)
            && (self.min.g..=self.max.g).contains(&pixel.g)
            && (self.min.b..=self.max.b).contains(&pixel.b)
    }

    /// `max(0, 1 - distance(pixel, center) / 255)`.
    pub fn confidence(&self, pixel: Rgb) -> f64 {
        let (cr, cg, cb) = self.center();
        let dr = f64::from(pixel.r) - cr;
        let dg = f64::from(pixel.g) - cg;
        let db = f64::from(pixel.b) - cb;
        let distance = (dr * dr + dg * dg + db * db).sqrt();
        (1.0 - distance / CONFIDENCE_SPAN).max(0.0)
    }

    /// Match and score in one step. `None` when the pixel is out of range.
    pub fn classify(&self, pixel: Rgb) -> Option<f64> {
        self.matches(pixel).then(|| self.confidence(pixel))
    }
}

/// The active set of profiles, re-derived whenever the sensitivity changes.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    sensitivity: Sensitivity,
    profiles: Vec<ColorProfile>,
}

impl ProfileSet {
    pub fn from_templates(templates: &[ProfileTemplate], sensitivity: Sensitivity) -> Self {
        Self {
            sensitivity,
            profiles: templates
                .iter()
                .map(|t| ColorProfile::derive(t, sensitivity))
                .collect(),
        }
    }

    /// The red/green/blue bench profiles.
    pub fn standard(sensitivity: Sensitivity) -> Self {
        Self::from_templates(&STANDARD_TEMPLATES, sensitivity)
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    pub fn profiles(&self) -> &[ColorProfile] {
        &self.profiles
    }

    /// Look up the display label for a colour name.
    pub fn label_for(&self, color: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.name == color)
            .map(|p| p.label.as_str())
    }
}
