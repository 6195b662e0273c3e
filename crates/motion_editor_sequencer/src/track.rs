// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions for the sequencer.
//!
//! A track is a time-sorted list of keyframes for one property of one entity.
//! Lookups and insertions binary search the list; the list never holds two
//! keyframes closer than [`INSERT_EPSILON`].

use crate::keyframe::{
    ColorKeyframe, ColorProperty, Easing, Interpolation, Keyframe, KeyframeId, NumericKeyframe,
    Property,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Two keyframe times closer than this are the same slot; inserting into an
/// occupied slot overwrites it
pub const INSERT_EPSILON: f64 = 1e-4;

/// Default window for "clear keyframes here" and "is there a keyframe here"
pub const DELETE_EPSILON: f64 = 0.02;

/// Window used to merge keyframe times into display markers
pub const MARKER_EPSILON: f64 = 0.001;

/// Keyframes straddling a time
#[derive(Debug)]
pub struct Bounding<'a, P, V> {
    /// Last keyframe at or before the time
    pub previous: Option<&'a Keyframe<P, V>>,
    /// First keyframe at or after the time
    pub next: Option<&'a Keyframe<P, V>>,
}

impl<P, V> Bounding<'_, P, V> {
    /// True when both sides resolve to the same keyframe slot, so the value is
    /// taken directly without dividing by the span
    pub fn is_single(&self) -> bool {
        match (self.previous, self.next) {
            (Some(a), Some(b)) => {
                std::ptr::eq(a, b) || (b.time - a.time).abs() <= INSERT_EPSILON
            }
            _ => false,
        }
    }
}

/// A sorted keyframe track for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track<P, V> {
    /// Property this track animates
    pub property: P,
    /// Keyframes in strictly ascending time order
    keyframes: Vec<Keyframe<P, V>>,
}

/// Track of numeric keyframes
pub type NumericTrack = Track<Property, f64>;

/// Track of color keyframes
pub type ColorTrack = Track<ColorProperty, String>;

impl<P: Copy, V: Clone> Track<P, V> {
    /// Create an empty track
    pub fn new(property: P) -> Self {
        Self {
            property,
            keyframes: Vec::new(),
        }
    }

    /// Insert a keyframe, or overwrite the one already within [`INSERT_EPSILON`].
    ///
    /// An overwrite keeps the existing keyframe's id and time and replaces its
    /// value and easing. Non-finite times are keyed at zero.
    pub fn insert(&mut self, time: f64, value: V, easing: Easing) -> KeyframeId {
        let time = if time.is_finite() { time } else { 0.0 };
        let idx = self.lower_bound(time);

        if let Some(near) = self.nearest_index(idx, time, INSERT_EPSILON) {
            let existing = &mut self.keyframes[near];
            existing.value = value;
            existing.easing = easing;
            return existing.id;
        }

        let keyframe = Keyframe::new(self.property, time, value).with_easing(easing);
        let id = keyframe.id;
        self.keyframes.insert(idx, keyframe);
        id
    }

    /// Remove every keyframe within `epsilon` of `time`. Returns how many were removed.
    ///
    /// A non-finite time or a negative or NaN epsilon removes nothing.
    pub fn delete_near(&mut self, time: f64, epsilon: f64) -> usize {
        if !time.is_finite() || epsilon.is_nan() || epsilon < 0.0 {
            return 0;
        }
        let before = self.keyframes.len();
        self.keyframes.retain(|k| (k.time - time).abs() > epsilon);
        before - self.keyframes.len()
    }

    /// Check if a keyframe exists within `epsilon` of `time`
    pub fn has_near(&self, time: f64, epsilon: f64) -> bool {
        self.nearest(time, epsilon).is_some()
    }

    /// Closest keyframe within `epsilon` of `time`
    pub fn nearest(&self, time: f64, epsilon: f64) -> Option<&Keyframe<P, V>> {
        let idx = self.lower_bound(time);
        self.nearest_index(idx, time, epsilon)
            .map(|i| &self.keyframes[i])
    }

    /// Find the keyframes straddling `time`.
    ///
    /// Before the first keyframe both sides are the first keyframe, after the
    /// last both sides are the last: values hold instead of extrapolating.
    pub fn find_bounding(&self, time: f64) -> Bounding<'_, P, V> {
        let (Some(first), Some(last)) = (self.keyframes.first(), self.keyframes.last()) else {
            return Bounding {
                previous: None,
                next: None,
            };
        };

        if time.is_nan() || time <= first.time {
            return Bounding {
                previous: Some(first),
                next: Some(first),
            };
        }
        if time >= last.time {
            return Bounding {
                previous: Some(last),
                next: Some(last),
            };
        }

        // first.time < time < last.time, so 1 <= idx < len
        let idx = self.keyframes.partition_point(|k| k.time <= time);
        Bounding {
            previous: Some(&self.keyframes[idx - 1]),
            next: Some(&self.keyframes[idx]),
        }
    }

    /// Get all keyframes
    pub fn keyframes(&self) -> &[Keyframe<P, V>] {
        &self.keyframes
    }

    /// Get keyframe by ID
    pub fn keyframe(&self, keyframe_id: KeyframeId) -> Option<&Keyframe<P, V>> {
        self.keyframes.iter().find(|k| k.id == keyframe_id)
    }

    /// Earliest keyframe
    pub fn first(&self) -> Option<&Keyframe<P, V>> {
        self.keyframes.first()
    }

    /// Latest keyframe
    pub fn last(&self) -> Option<&Keyframe<P, V>> {
        self.keyframes.last()
    }

    /// Keyframe times in ascending order
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.keyframes.iter().map(|k| k.time)
    }

    /// Get the duration (time of last keyframe)
    pub fn duration(&self) -> f64 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Get keyframe count
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Check if the track has no keyframes
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Index of the first keyframe with `k.time >= time`
    fn lower_bound(&self, time: f64) -> usize {
        self.keyframes.partition_point(|k| k.time < time)
    }

    /// Closest of the two neighbours of `idx`, if within `epsilon` of `time`
    fn nearest_index(&self, idx: usize, time: f64, epsilon: f64) -> Option<usize> {
        let before = idx.checked_sub(1);
        let after = (idx < self.keyframes.len()).then_some(idx);

        [before, after]
            .into_iter()
            .flatten()
            .map(|i| (i, (self.keyframes[i].time - time).abs()))
            .filter(|(_, distance)| *distance <= epsilon)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

impl<P: Copy> Track<P, f64> {
    /// Evaluate the track at `time` using linear interpolation.
    ///
    /// Returns `None` only for an empty track.
    pub fn sample(&self, time: f64) -> Option<f64> {
        let bounding = self.find_bounding(time);
        let (previous, next) = (bounding.previous?, bounding.next?);

        if bounding.is_single() {
            return Some(previous.value);
        }

        let progress = Interpolation::progress(previous.time, next.time, time);
        Some(Interpolation::lerp(previous.value, next.value, progress))
    }
}

/// All tracks of one entity, keyed by property.
///
/// A property with no keyframes has no entry; tracks emptied by a deletion are
/// dropped from the map. This is a plain value type, so cloning it is the
/// snapshot taken for undo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSet {
    numeric: IndexMap<Property, NumericTrack>,
    colors: IndexMap<ColorProperty, ColorTrack>,
}

impl TrackSet {
    /// Create an empty track set
    pub fn new() -> Self {
        Self::default()
    }

    /// Key a numeric property, creating its track on first use
    pub fn insert(&mut self, property: Property, time: f64, value: f64, easing: Easing) -> KeyframeId {
        self.numeric
            .entry(property)
            .or_insert_with(|| Track::new(property))
            .insert(time, property.sanitize(value), easing)
    }

    /// Key a color property, creating its track on first use
    pub fn insert_color(
        &mut self,
        property: ColorProperty,
        time: f64,
        value: impl Into<String>,
        easing: Easing,
    ) -> KeyframeId {
        self.colors
            .entry(property)
            .or_insert_with(|| Track::new(property))
            .insert(time, value.into(), easing)
    }

    /// Remove numeric keyframes within `epsilon` of `time` on every track.
    /// Returns how many keyframes were removed.
    pub fn delete_near(&mut self, time: f64, epsilon: f64) -> usize {
        let removed = self
            .numeric
            .values_mut()
            .map(|track| track.delete_near(time, epsilon))
            .sum();
        self.numeric.retain(|_, track| !track.is_empty());
        removed
    }

    /// Check if any numeric track has a keyframe within `epsilon` of `time`
    pub fn has_near(&self, time: f64, epsilon: f64) -> bool {
        self.numeric.values().any(|track| track.has_near(time, epsilon))
    }

    /// Get the track for a numeric property
    pub fn track(&self, property: Property) -> Option<&NumericTrack> {
        self.numeric.get(&property)
    }

    /// Get the track for a color property
    pub fn color_track(&self, property: ColorProperty) -> Option<&ColorTrack> {
        self.colors.get(&property)
    }

    /// Iterate numeric tracks
    pub fn tracks(&self) -> impl Iterator<Item = &NumericTrack> {
        self.numeric.values()
    }

    /// Iterate color tracks
    pub fn color_tracks(&self) -> impl Iterator<Item = &ColorTrack> {
        self.colors.values()
    }

    /// Find a numeric keyframe by ID on any track
    pub fn keyframe(&self, keyframe_id: KeyframeId) -> Option<&NumericKeyframe> {
        self.numeric.values().find_map(|track| track.keyframe(keyframe_id))
    }

    /// Find a color keyframe by ID on any track
    pub fn color_keyframe(&self, keyframe_id: KeyframeId) -> Option<&ColorKeyframe> {
        self.colors.values().find_map(|track| track.keyframe(keyframe_id))
    }

    /// Total keyframe count across numeric and color tracks
    pub fn keyframe_count(&self) -> usize {
        self.numeric.values().map(Track::len).sum::<usize>()
            + self.colors.values().map(Track::len).sum::<usize>()
    }

    /// Check if no track holds a keyframe
    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.colors.is_empty()
    }

    /// Distinct keyframe times across all tracks, ascending, merged within
    /// [`MARKER_EPSILON`]
    pub fn markers(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .numeric
            .values()
            .flat_map(|track| track.times())
            .chain(self.colors.values().flat_map(|track| track.times()))
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup_by(|later, earlier| (*later - *earlier).abs() <= MARKER_EPSILON);
        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(points: &[(f64, f64)]) -> NumericTrack {
        let mut track = Track::new(Property::Left);
        for (time, value) in points {
            track.insert(*time, *value, Easing::Linear);
        }
        track
    }

    #[test]
    fn test_insert_keeps_order() {
        let track = track_with(&[(2.0, 20.0), (0.0, 0.0), (1.0, 10.0), (3.0, 30.0)]);
        let times: Vec<f64> = track.times().collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(track.first().map(|k| k.value), Some(0.0));
        assert_eq!(track.last().map(|k| k.value), Some(30.0));
        assert_eq!(track.duration(), 3.0);
    }

    #[test]
    fn test_insert_within_epsilon_replaces() {
        let mut track = Track::new(Property::Left);
        let first = track.insert(1.00005, 5.0, Easing::Linear);
        let second = track.insert(1.00002, 7.0, Easing::EaseIn);

        assert_eq!(track.len(), 1);
        assert_eq!(first, second);
        let kf = &track.keyframes()[0];
        assert_eq!(kf.time, 1.00005);
        assert_eq!(kf.value, 7.0);
        assert_eq!(kf.easing, Easing::EaseIn);
    }

    #[test]
    fn test_insert_outside_epsilon_adds() {
        let mut track = Track::new(Property::Left);
        track.insert(1.0, 5.0, Easing::Linear);
        track.insert(1.001, 6.0, Easing::Linear);
        assert_eq!(track.len(), 2);
    }

    #[test]
    fn test_find_bounding_edges() {
        let empty: NumericTrack = Track::new(Property::Top);
        let b = empty.find_bounding(1.0);
        assert!(b.previous.is_none() && b.next.is_none());

        let track = track_with(&[(0.0, 0.0), (2.0, 200.0), (4.0, 0.0)]);

        let b = track.find_bounding(-5.0);
        assert_eq!(b.previous.map(|k| k.time), Some(0.0));
        assert!(b.is_single());

        let b = track.find_bounding(10.0);
        assert_eq!(b.next.map(|k| k.time), Some(4.0));
        assert!(b.is_single());

        let b = track.find_bounding(3.0);
        assert_eq!(b.previous.map(|k| k.time), Some(2.0));
        assert_eq!(b.next.map(|k| k.time), Some(4.0));

        let b = track.find_bounding(2.0);
        assert_eq!(b.previous.map(|k| k.time), Some(2.0));
        assert_eq!(b.next.map(|k| k.time), Some(4.0));
    }

    #[test]
    fn test_sample_linear_and_hold() {
        let track = track_with(&[(0.0, 0.0), (2.0, 200.0)]);
        assert_eq!(track.sample(1.0), Some(100.0));
        assert_eq!(track.sample(-5.0), Some(0.0));
        assert_eq!(track.sample(0.0), Some(0.0));
        assert_eq!(track.sample(10.0), Some(200.0));
        assert_eq!(track.sample(f64::NAN), Some(0.0));
    }

    #[test]
    fn test_single_keyframe_holds() {
        let track = track_with(&[(1.5, 42.0)]);
        for time in [-100.0, 0.0, 1.5, 3.0, 1e9] {
            assert_eq!(track.sample(time), Some(42.0));
        }
    }

    #[test]
    fn test_delete_and_has_near() {
        let mut track = track_with(&[(0.0, 0.0), (1.0, 1.0), (1.01, 2.0), (2.0, 3.0)]);
        assert!(track.has_near(1.015, DELETE_EPSILON));
        assert!(!track.has_near(1.5, DELETE_EPSILON));

        assert_eq!(track.delete_near(1.005, DELETE_EPSILON), 2);
        let times: Vec<f64> = track.times().collect();
        assert_eq!(times, vec![0.0, 2.0]);
    }

    #[test]
    fn test_delete_ignores_malformed_input() {
        let mut track = track_with(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(track.delete_near(f64::NAN, DELETE_EPSILON), 0);
        assert_eq!(track.delete_near(f64::INFINITY, DELETE_EPSILON), 0);
        assert_eq!(track.delete_near(3.0, f64::NAN), 0);
        assert_eq!(track.delete_near(1.0, -1.0), 0);
        assert_eq!(track.len(), 3);

        let mut set = TrackSet::new();
        set.insert(Property::Left, 1.0, 10.0, Easing::Linear);
        set.insert(Property::Top, 2.0, 20.0, Easing::Linear);
        assert_eq!(set.delete_near(f64::NAN, DELETE_EPSILON), 0);
        assert_eq!(set.delete_near(2.0, f64::NAN), 0);
        assert_eq!(set.keyframe_count(), 2);
    }

    #[test]
    fn test_track_set_drops_empty_tracks() {
        let mut set = TrackSet::new();
        set.insert(Property::Left, 1.0, 10.0, Easing::Linear);
        set.insert(Property::Top, 1.0, 20.0, Easing::Linear);
        set.insert(Property::Top, 2.0, 30.0, Easing::Linear);

        assert_eq!(set.delete_near(1.0, DELETE_EPSILON), 2);
        assert!(set.track(Property::Left).is_none());
        assert_eq!(set.track(Property::Top).map(Track::len), Some(1));
    }

    #[test]
    fn test_track_set_sanitizes_values() {
        let mut set = TrackSet::new();
        set.insert(Property::Opacity, 0.0, 4.0, Easing::Linear);
        set.insert(Property::ScaleX, 0.0, f64::NAN, Easing::Linear);
        assert_eq!(set.track(Property::Opacity).and_then(|t| t.sample(0.0)), Some(1.0));
        assert_eq!(set.track(Property::ScaleX).and_then(|t| t.sample(0.0)), Some(1.0));
    }

    #[test]
    fn test_markers_merge_close_times() {
        let mut set = TrackSet::new();
        set.insert(Property::Left, 2.0, 0.0, Easing::Linear);
        set.insert(Property::Top, 0.0, 0.0, Easing::Linear);
        set.insert(Property::Angle, 2.0005, 0.0, Easing::Linear);
        set.insert_color(ColorProperty::Fill, 1.0, "#ff0000", Easing::Linear);

        assert_eq!(set.markers(), vec![0.0, 1.0, 2.0]);
        assert_eq!(set.keyframe_count(), 4);
    }
}
