// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animatable entities: a drawable plus the tracks that drive it.

use crate::drawable::DrawableHandle;
use crate::keyframe::{ColorProperty, Easing, KeyframeId, KeyframeSpec, Property};
use crate::track::TrackSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an animatable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live values of every numeric property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    /// Horizontal position
    pub left: f64,
    /// Vertical position
    pub top: f64,
    /// Horizontal scale
    pub scale_x: f64,
    /// Vertical scale
    pub scale_y: f64,
    /// Opacity
    pub opacity: f64,
    /// Rotation in degrees
    pub angle: f64,
}

impl Default for TransformSnapshot {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            angle: 0.0,
        }
    }
}

impl TransformSnapshot {
    /// Value of one property
    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Left => self.left,
            Property::Top => self.top,
            Property::ScaleX => self.scale_x,
            Property::ScaleY => self.scale_y,
            Property::Opacity => self.opacity,
            Property::Angle => self.angle,
        }
    }

    /// Overwrite one property, sanitizing the value
    pub fn set(&mut self, property: Property, value: f64) {
        let value = property.sanitize(value);
        match property {
            Property::Left => self.left = value,
            Property::Top => self.top = value,
            Property::ScaleX => self.scale_x = value,
            Property::ScaleY => self.scale_y = value,
            Property::Opacity => self.opacity = value,
            Property::Angle => self.angle = value,
        }
    }

    /// Copy with every field sanitized
    pub fn sanitized(&self) -> Self {
        let mut out = *self;
        for property in Property::ALL {
            out.set(property, self.get(property));
        }
        out
    }
}

/// A drawable whose numeric properties are driven by keyframe tracks.
///
/// The entity owns its tracks. The drawable is shared with the rendering host,
/// which stays responsible for its lifecycle.
#[derive(Debug, Clone)]
pub struct AnimatableEntity {
    id: EntityId,
    drawable: DrawableHandle,
    tracks: TrackSet,
}

impl AnimatableEntity {
    /// Create an entity with no keyframes
    pub fn new(id: EntityId, drawable: DrawableHandle) -> Self {
        Self::with_tracks(id, drawable, TrackSet::new())
    }

    /// Create an entity from existing tracks
    pub fn with_tracks(id: EntityId, drawable: DrawableHandle, tracks: TrackSet) -> Self {
        Self {
            id,
            drawable,
            tracks,
        }
    }

    /// Entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Shared drawable handle
    pub fn drawable(&self) -> &DrawableHandle {
        &self.drawable
    }

    /// Tracks driving this entity
    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    /// Replace all tracks
    pub fn set_tracks(&mut self, tracks: TrackSet) {
        self.tracks = tracks;
    }

    /// Read the live values off the drawable, substituting defaults for
    /// non-finite reads
    pub fn snapshot(&self) -> TransformSnapshot {
        let drawable = self.drawable.lock();
        let mut snapshot = TransformSnapshot::default();
        for property in Property::ALL {
            snapshot.set(property, drawable.get(property));
        }
        snapshot
    }

    /// Write a snapshot straight to the drawable, bypassing the tracks
    pub fn apply_snapshot(&self, snapshot: &TransformSnapshot) {
        let snapshot = snapshot.sanitized();
        let mut drawable = self.drawable.lock();
        for property in Property::ALL {
            drawable.set(property, snapshot.get(property));
        }
        drawable.set_coords();
    }

    /// Key every numeric property at `time` from a snapshot
    pub fn add_snapshot_keyframe(&mut self, time: f64, snapshot: &TransformSnapshot) {
        for property in Property::ALL {
            self.tracks
                .insert(property, time, snapshot.get(property), Easing::Linear);
        }
    }

    /// Key one numeric property
    pub fn add_keyframe(&mut self, spec: KeyframeSpec) -> KeyframeId {
        self.tracks
            .insert(spec.property, spec.time, spec.value, spec.easing)
    }

    /// Key one color property. Color tracks are stored but not evaluated by [`Self::seek`].
    pub fn add_color_keyframe(
        &mut self,
        property: ColorProperty,
        time: f64,
        value: impl Into<String>,
        easing: Easing,
    ) -> KeyframeId {
        self.tracks.insert_color(property, time, value, easing)
    }

    /// Remove numeric keyframes within `epsilon` of `time`. Returns how many were removed.
    pub fn delete_keyframe_at_time(&mut self, time: f64, epsilon: f64) -> usize {
        self.tracks.delete_near(time, epsilon)
    }

    /// Check if any numeric track has a keyframe within `epsilon` of `time`
    pub fn has_any_keyframe_at_time(&self, time: f64, epsilon: f64) -> bool {
        self.tracks.has_near(time, epsilon)
    }

    /// Timeline markers for display
    pub fn markers(&self) -> Vec<f64> {
        self.tracks.markers()
    }

    /// Evaluate every numeric track at `time` and write the results to the drawable.
    ///
    /// Properties without a track keep their live value. The result depends
    /// only on the tracks and `time`.
    pub fn seek(&self, time: f64) {
        let time = if time.is_nan() { 0.0 } else { time };
        let mut drawable = self.drawable.lock();
        for track in self.tracks.tracks() {
            if let Some(value) = track.sample(time) {
                drawable.set(track.property, value);
            }
        }
        drawable.set_coords();
    }
}
