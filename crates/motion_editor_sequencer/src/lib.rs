// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe animation core for the Motion Editor.
//!
//! This crate provides the parts of the editor that evaluate animation:
//! - Sorted per-property keyframe tracks with linear interpolation
//! - Animatable entities binding tracks to host drawables
//! - A looping timeline clock driven by animation frames
//! - Mask proxies kept in sync with their source drawables
//!
//! ## Architecture
//!
//! Rendering stays with the host. The engine talks to it through the narrow
//! [`Drawable`] and [`Canvas`] traits and asks for frames through a
//! [`FrameScheduler`]. Headless implementations of all three are included.

pub mod clock;
pub mod drawable;
pub mod entity;
pub mod keyframe;
pub mod mask;
pub mod track;

pub use clock::{FrameRequest, FrameScheduler, ManualScheduler, PlaybackState, TimelineClock};
pub use drawable::{
    into_handle, same_drawable, Canvas, Drawable, DrawableHandle, Geometry, GeometryEvent,
    GeometryListener, HeadlessCanvas, HeadlessDrawable, ListenerKey, OriginX, OriginY,
    WeakDrawable,
};
pub use entity::{AnimatableEntity, EntityId, TransformSnapshot};
pub use keyframe::{
    ColorKeyframe, ColorProperty, Easing, Interpolation, Keyframe, KeyframeId, KeyframeSpec,
    NumericKeyframe, Property,
};
pub use mask::{GeometrySubscription, MaskBinding, MaskSync, MaskTicket};
pub use track::{
    Bounding, ColorTrack, NumericTrack, Track, TrackSet, DELETE_EPSILON, INSERT_EPSILON,
    MARKER_EPSILON,
};
