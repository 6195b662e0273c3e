// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for the sequencer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Easing tag carried by a keyframe.
///
/// Only [`Easing::Linear`] is evaluated; the other variants are stored so that
/// authored data survives round trips through the editor untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Easing {
    /// Linear interpolation
    #[default]
    Linear,
    /// Slow start
    EaseIn,
    /// Slow end
    EaseOut,
    /// Slow start and end
    EaseInOut,
    /// Overshooting spring
    Elastic,
    /// Bouncing settle
    Bounce,
}

/// Numeric property of a drawable that can be keyframed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    /// Horizontal position
    Left,
    /// Vertical position
    Top,
    /// Horizontal scale factor
    ScaleX,
    /// Vertical scale factor
    ScaleY,
    /// Opacity in `[0, 1]`
    Opacity,
    /// Rotation in degrees
    Angle,
}

impl Property {
    /// All numeric properties, in evaluation order
    pub const ALL: [Property; 6] = [
        Property::Left,
        Property::Top,
        Property::ScaleX,
        Property::ScaleY,
        Property::Opacity,
        Property::Angle,
    ];

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Top => "top",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::Opacity => "opacity",
            Self::Angle => "angle",
        }
    }

    /// Value used when a read or an input is not a finite number
    pub fn default_value(&self) -> f64 {
        match self {
            Self::Left | Self::Top | Self::Angle => 0.0,
            Self::ScaleX | Self::ScaleY | Self::Opacity => 1.0,
        }
    }

    /// Coerce an arbitrary input into a valid value for this property.
    ///
    /// Non-finite input yields [`Property::default_value`]; opacity is clamped
    /// to `[0, 1]`.
    pub fn sanitize(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.default_value();
        }
        match self {
            Self::Opacity => value.clamp(0.0, 1.0),
            _ => value,
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Color property of a drawable. Stored on tracks, never interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColorProperty {
    /// Fill paint
    Fill,
    /// Stroke paint
    Stroke,
}

impl ColorProperty {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Stroke => "stroke",
        }
    }
}

/// A keyframe in a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<P, V> {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Property this keyframe animates
    pub property: P,
    /// Value at this keyframe
    pub value: V,
    /// Time in seconds
    pub time: f64,
    /// Easing toward the next keyframe
    pub easing: Easing,
}

/// Keyframe on a numeric track
pub type NumericKeyframe = Keyframe<Property, f64>;

/// Keyframe on a color track; the value is a CSS-style color string
pub type ColorKeyframe = Keyframe<ColorProperty, String>;

impl<P, V> Keyframe<P, V> {
    /// Create a new keyframe with linear easing
    pub fn new(property: P, time: f64, value: V) -> Self {
        Self {
            id: KeyframeId::new(),
            property,
            value,
            time,
            easing: Easing::Linear,
        }
    }

    /// Set easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Request to key one numeric property
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyframeSpec {
    /// Property to key
    pub property: Property,
    /// Value at `time`
    pub value: f64,
    /// Time in seconds
    pub time: f64,
    /// Easing tag
    pub easing: Easing,
}

impl KeyframeSpec {
    /// Create a linear keyframe request
    pub fn new(property: Property, time: f64, value: f64) -> Self {
        Self {
            property,
            value,
            time,
            easing: Easing::Linear,
        }
    }

    /// Set easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two values
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Normalized position of `time` between two keyframe times, clamped to `[0, 1]`
    pub fn progress(start: f64, end: f64, time: f64) -> f64 {
        ((time - start) / (end - start)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_defaults() {
        assert_eq!(Property::Left.sanitize(f64::NAN), 0.0);
        assert_eq!(Property::ScaleX.sanitize(f64::INFINITY), 1.0);
        assert_eq!(Property::Opacity.sanitize(f64::NEG_INFINITY), 1.0);
        assert_eq!(Property::Opacity.sanitize(3.0), 1.0);
        assert_eq!(Property::Opacity.sanitize(-0.5), 0.0);
        assert_eq!(Property::Angle.sanitize(-45.0), -45.0);
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(Interpolation::progress(0.0, 2.0, 1.0), 0.5);
        assert_eq!(Interpolation::progress(0.0, 2.0, -1.0), 0.0);
        assert_eq!(Interpolation::progress(0.0, 2.0, 5.0), 1.0);
        assert_eq!(Interpolation::lerp(0.0, 200.0, 0.5), 100.0);
    }
}
