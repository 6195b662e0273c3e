// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drawable capability interface.
//!
//! The sequencer never rasterizes anything. It drives drawables owned by a
//! rendering host through the narrow [`Drawable`] trait, which exposes only
//! the transform, clip and visibility fields the engine touches.
//!
//! [`HeadlessDrawable`] and [`HeadlessCanvas`] are in-memory implementations
//! for tests and for hosts that evaluate animation without a renderer.

use crate::entity::EntityId;
use crate::keyframe::Property;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Shared handle to a drawable owned by the rendering host
pub type DrawableHandle = Arc<Mutex<dyn Drawable>>;

/// Non-owning handle to a drawable
pub type WeakDrawable = Weak<Mutex<dyn Drawable>>;

/// Callback invoked when a drawable's geometry changes outside the timeline
pub type GeometryListener = Box<dyn FnMut(GeometryEvent, &Geometry) + Send>;

/// Wrap a drawable into a shared handle
pub fn into_handle<D: Drawable + 'static>(drawable: D) -> DrawableHandle {
    Arc::new(Mutex::new(drawable))
}

/// Identity comparison for drawable handles
pub fn same_drawable(a: &DrawableHandle, b: &DrawableHandle) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Key returned by [`Drawable::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub u64);

/// Geometry change notifications a drawable emits during user gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryEvent {
    /// Dragged
    Moving,
    /// Resized
    Scaling,
    /// Rotated
    Rotating,
    /// Skewed
    Skewing,
    /// A gesture finished
    Modified,
    /// Changed programmatically
    Changed,
}

/// Horizontal transform origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginX {
    /// Left edge
    #[default]
    Left,
    /// Center
    Center,
    /// Right edge
    Right,
}

/// Vertical transform origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginY {
    /// Top edge
    #[default]
    Top,
    /// Center
    Center,
    /// Bottom edge
    Bottom,
}

/// Full 2D placement of a drawable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Horizontal position
    pub left: f64,
    /// Vertical position
    pub top: f64,
    /// Horizontal scale
    pub scale_x: f64,
    /// Vertical scale
    pub scale_y: f64,
    /// Rotation in degrees
    pub angle: f64,
    /// Horizontal skew in degrees
    pub skew_x: f64,
    /// Vertical skew in degrees
    pub skew_y: f64,
    /// Mirrored horizontally
    pub flip_x: bool,
    /// Mirrored vertically
    pub flip_y: bool,
    /// Horizontal origin
    pub origin_x: OriginX,
    /// Vertical origin
    pub origin_y: OriginY,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            flip_x: false,
            flip_y: false,
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
        }
    }
}

/// Capabilities the animation engine needs from a rendered object
pub trait Drawable: Send + fmt::Debug {
    /// Read a numeric property
    fn get(&self, property: Property) -> f64;

    /// Write a numeric property
    fn set(&mut self, property: Property, value: f64);

    /// Read the full placement
    fn geometry(&self) -> Geometry;

    /// Overwrite the full placement
    fn set_geometry(&mut self, geometry: &Geometry);

    /// Recompute cached bounds after a batch of writes
    fn set_coords(&mut self);

    /// Create an independent copy of this drawable, without listeners or clip region
    fn duplicate(&self) -> DrawableHandle;

    /// Entity id stamped on this drawable, if any
    fn identity(&self) -> Option<EntityId>;

    /// Stamp an entity id for lookup
    fn set_identity(&mut self, id: Option<EntityId>);

    /// Whether the drawable is painted
    fn visible(&self) -> bool;

    /// Show or hide the drawable
    fn set_visible(&mut self, visible: bool);

    /// Whether the drawable receives pointer events
    fn evented(&self) -> bool;

    /// Enable or disable pointer events
    fn set_evented(&mut self, evented: bool);

    /// Position a clip drawable in canvas space instead of relative to its owner
    fn set_absolute_positioned(&mut self, absolute: bool);

    /// Current clip region
    fn clip_path(&self) -> Option<DrawableHandle>;

    /// Install or clear the clip region
    fn set_clip_path(&mut self, clip: Option<DrawableHandle>);

    /// Register a geometry change listener
    fn subscribe(&mut self, listener: GeometryListener) -> ListenerKey;

    /// Remove a listener. Returns false if the key was unknown.
    fn unsubscribe(&mut self, key: ListenerKey) -> bool;

    /// Release any host resources. The drawable is not used afterwards.
    fn dispose(&mut self) {}
}

/// Scene membership of drawables on the rendering host
pub trait Canvas: Send {
    /// Add a drawable to the painted scene
    fn add(&mut self, drawable: &DrawableHandle);

    /// Remove a drawable from the painted scene
    fn remove(&mut self, drawable: &DrawableHandle);

    /// Check whether a drawable is in the painted scene
    fn contains(&self, drawable: &DrawableHandle) -> bool;

    /// Ask the host to repaint once
    fn request_render(&mut self);
}

/// In-memory drawable
pub struct HeadlessDrawable {
    /// Placement
    pub geometry: Geometry,
    /// Opacity
    pub opacity: f64,
    /// Painted flag
    pub visible: bool,
    /// Pointer events flag
    pub evented: bool,
    /// Absolute clip positioning flag
    pub absolute_positioned: bool,
    /// Stamped entity id
    pub identity: Option<EntityId>,
    /// Number of `set_coords` calls
    pub coords_updates: u64,
    /// Set by `dispose`
    pub disposed: bool,
    clip_path: Option<DrawableHandle>,
    listeners: Vec<(ListenerKey, GeometryListener)>,
    next_listener: u64,
}

impl HeadlessDrawable {
    /// Create a drawable at the origin with identity scale
    pub fn new() -> Self {
        Self {
            geometry: Geometry::default(),
            opacity: 1.0,
            visible: true,
            evented: true,
            absolute_positioned: false,
            identity: None,
            coords_updates: 0,
            disposed: false,
            clip_path: None,
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    /// Create a drawable at a position
    pub fn at(left: f64, top: f64) -> Self {
        let mut drawable = Self::new();
        drawable.geometry.left = left;
        drawable.geometry.top = top;
        drawable
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Notify listeners of a geometry change, the way a host does during a gesture
    pub fn emit(&mut self, event: GeometryEvent) {
        let geometry = self.geometry;
        for (_, listener) in &mut self.listeners {
            listener(event, &geometry);
        }
    }

    /// Move and notify listeners
    pub fn drag_to(&mut self, left: f64, top: f64) {
        self.geometry.left = left;
        self.geometry.top = top;
        self.emit(GeometryEvent::Moving);
    }
}

impl Default for HeadlessDrawable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadlessDrawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessDrawable")
            .field("geometry", &self.geometry)
            .field("opacity", &self.opacity)
            .field("visible", &self.visible)
            .field("evented", &self.evented)
            .field("identity", &self.identity)
            .field("has_clip_path", &self.clip_path.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Drawable for HeadlessDrawable {
    fn get(&self, property: Property) -> f64 {
        match property {
            Property::Left => self.geometry.left,
            Property::Top => self.geometry.top,
            Property::ScaleX => self.geometry.scale_x,
            Property::ScaleY => self.geometry.scale_y,
            Property::Opacity => self.opacity,
            Property::Angle => self.geometry.angle,
        }
    }

    fn set(&mut self, property: Property, value: f64) {
        match property {
            Property::Left => self.geometry.left = value,
            Property::Top => self.geometry.top = value,
            Property::ScaleX => self.geometry.scale_x = value,
            Property::ScaleY => self.geometry.scale_y = value,
            Property::Opacity => self.opacity = value,
            Property::Angle => self.geometry.angle = value,
        }
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn set_geometry(&mut self, geometry: &Geometry) {
        self.geometry = *geometry;
    }

    fn set_coords(&mut self) {
        self.coords_updates += 1;
    }

    fn duplicate(&self) -> DrawableHandle {
        let mut copy = HeadlessDrawable::new();
        copy.geometry = self.geometry;
        copy.opacity = self.opacity;
        copy.visible = self.visible;
        copy.evented = self.evented;
        copy.identity = self.identity;
        into_handle(copy)
    }

    fn identity(&self) -> Option<EntityId> {
        self.identity
    }

    fn set_identity(&mut self, id: Option<EntityId>) {
        self.identity = id;
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn evented(&self) -> bool {
        self.evented
    }

    fn set_evented(&mut self, evented: bool) {
        self.evented = evented;
    }

    fn set_absolute_positioned(&mut self, absolute: bool) {
        self.absolute_positioned = absolute;
    }

    fn clip_path(&self) -> Option<DrawableHandle> {
        self.clip_path.clone()
    }

    fn set_clip_path(&mut self, clip: Option<DrawableHandle>) {
        self.clip_path = clip;
    }

    fn subscribe(&mut self, listener: GeometryListener) -> ListenerKey {
        let key = ListenerKey(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((key, listener));
        key
    }

    fn unsubscribe(&mut self, key: ListenerKey) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(k, _)| *k != key);
        self.listeners.len() != before
    }

    fn dispose(&mut self) {
        self.listeners.clear();
        self.clip_path = None;
        self.disposed = true;
    }
}

/// In-memory canvas that tracks membership and counts render requests
#[derive(Default)]
pub struct HeadlessCanvas {
    drawables: Vec<DrawableHandle>,
    render_requests: u64,
}

impl HeadlessCanvas {
    /// Create an empty canvas
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of drawables in the scene
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    /// Check if the scene is empty
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Number of render requests received
    pub fn render_requests(&self) -> u64 {
        self.render_requests
    }
}

impl Canvas for HeadlessCanvas {
    fn add(&mut self, drawable: &DrawableHandle) {
        if !self.contains(drawable) {
            self.drawables.push(drawable.clone());
        }
    }

    fn remove(&mut self, drawable: &DrawableHandle) {
        self.drawables.retain(|d| !same_drawable(d, drawable));
    }

    fn contains(&self, drawable: &DrawableHandle) -> bool {
        self.drawables.iter().any(|d| same_drawable(d, drawable))
    }

    fn request_render(&mut self) {
        self.render_requests += 1;
    }
}

/// Canvas that can be shared between an editor and an observer
impl<C: Canvas> Canvas for Arc<Mutex<C>> {
    fn add(&mut self, drawable: &DrawableHandle) {
        self.lock().add(drawable);
    }

    fn remove(&mut self, drawable: &DrawableHandle) {
        self.lock().remove(drawable);
    }

    fn contains(&self, drawable: &DrawableHandle) -> bool {
        self.lock().contains(drawable)
    }

    fn request_render(&mut self) {
        self.lock().request_render();
    }
}
