// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mask proxy synchronization.
//!
//! Masking one entity by another installs an invisible copy of the source
//! drawable (the proxy) as the target's clip region. The proxy follows the
//! source's placement two ways: a geometry listener on the source catches
//! gestures between frames, and [`MaskSync::sync`] runs once per published
//! timeline time.
//!
//! Installing is split into [`MaskSync::request`] and [`MaskSync::install`] so
//! a host that copies drawables asynchronously can hold a [`MaskTicket`] while
//! the copy is in flight. Any later request, unbind or source removal makes
//! the ticket stale, and a stale install disposes the proxy instead of
//! attaching it.

use crate::drawable::{same_drawable, DrawableHandle, Geometry, ListenerKey, WeakDrawable};
use crate::entity::EntityId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Registration of a geometry listener on a source drawable.
///
/// Dropping the subscription removes the listener.
pub struct GeometrySubscription {
    source: WeakDrawable,
    key: ListenerKey,
}

impl GeometrySubscription {
    /// Wrap a listener key returned by `Drawable::subscribe`
    pub fn new(source: &DrawableHandle, key: ListenerKey) -> Self {
        Self {
            source: Arc::downgrade(source),
            key,
        }
    }

    /// Listener key on the source
    pub fn key(&self) -> ListenerKey {
        self.key
    }
}

impl Drop for GeometrySubscription {
    fn drop(&mut self) {
        let Some(source) = self.source.upgrade() else {
            return;
        };
        match source.try_lock() {
            Some(mut drawable) => {
                drawable.unsubscribe(self.key);
            }
            None => tracing::warn!(key = self.key.0, "Mask source busy, listener left attached"),
        };
    }
}

impl std::fmt::Debug for GeometrySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometrySubscription")
            .field("key", &self.key)
            .finish()
    }
}

/// Cancellation token for an in-flight proxy install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskTicket {
    /// Entity being masked
    pub target: EntityId,
    /// Entity whose shape is the mask
    pub source: EntityId,
    generation: u64,
}

/// An installed mask
#[derive(Debug)]
pub struct MaskBinding {
    /// Entity being masked
    pub target: EntityId,
    /// Entity whose shape is the mask
    pub source: EntityId,
    proxy: DrawableHandle,
    target_drawable: WeakDrawable,
    source_drawable: WeakDrawable,
    _subscription: GeometrySubscription,
}

impl MaskBinding {
    /// The clip proxy installed on the target
    pub fn proxy(&self) -> &DrawableHandle {
        &self.proxy
    }
}

/// Registry of mask bindings, at most one per target
#[derive(Debug, Default)]
pub struct MaskSync {
    bindings: IndexMap<EntityId, MaskBinding>,
    generations: HashMap<EntityId, u64>,
    pending: HashMap<EntityId, MaskTicket>,
}

impl MaskSync {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask `target` by `source`, replacing any existing binding.
    ///
    /// A missing source, or a source that is the target itself, unbinds.
    /// Returns true if a proxy was installed.
    pub fn bind(
        &mut self,
        target: EntityId,
        target_drawable: &DrawableHandle,
        source: Option<(EntityId, &DrawableHandle)>,
    ) -> bool {
        let Some((source_id, source_drawable)) = source else {
            self.unbind(target);
            return false;
        };
        if source_id == target || same_drawable(source_drawable, target_drawable) {
            self.unbind(target);
            return false;
        }

        let ticket = self.request(target, source_id);
        let proxy = source_drawable.lock().duplicate();
        self.install(ticket, target_drawable, source_drawable, proxy)
    }

    /// Start an install. Any earlier ticket for `target` becomes stale.
    pub fn request(&mut self, target: EntityId, source: EntityId) -> MaskTicket {
        let ticket = MaskTicket {
            target,
            source,
            generation: self.bump(target),
        };
        self.pending.insert(target, ticket);
        ticket
    }

    /// Check whether a ticket is still the latest for its target
    pub fn is_current(&self, ticket: &MaskTicket) -> bool {
        self.pending.get(&ticket.target) == Some(ticket)
            && self.generations.get(&ticket.target) == Some(&ticket.generation)
    }

    /// Finish an install with a copy of the source drawable.
    ///
    /// A stale ticket disposes `proxy` and returns false.
    pub fn install(
        &mut self,
        ticket: MaskTicket,
        target_drawable: &DrawableHandle,
        source_drawable: &DrawableHandle,
        proxy: DrawableHandle,
    ) -> bool {
        if !self.is_current(&ticket) {
            tracing::warn!(masked = %ticket.target, mask = %ticket.source, "Discarding stale mask proxy");
            proxy.lock().dispose();
            return false;
        }
        self.pending.remove(&ticket.target);
        self.release(ticket.target);

        let geometry = source_drawable.lock().geometry();
        {
            let mut p = proxy.lock();
            p.set_visible(false);
            p.set_evented(false);
            p.set_absolute_positioned(true);
            p.set_identity(Some(ticket.source));
            p.set_geometry(&geometry);
            p.set_coords();
        }
        {
            let mut t = target_drawable.lock();
            t.set_clip_path(Some(proxy.clone()));
            t.set_coords();
        }

        let proxy_weak = Arc::downgrade(&proxy);
        let target_weak = Arc::downgrade(target_drawable);
        let key = source_drawable.lock().subscribe(Box::new(move |_event, geometry| {
            if let Some(proxy) = proxy_weak.upgrade() {
                follow(&proxy, geometry);
            }
            if let Some(target) = target_weak.upgrade() {
                target.lock().set_coords();
            }
        }));

        self.bindings.insert(
            ticket.target,
            MaskBinding {
                target: ticket.target,
                source: ticket.source,
                proxy,
                target_drawable: Arc::downgrade(target_drawable),
                source_drawable: Arc::downgrade(source_drawable),
                _subscription: GeometrySubscription::new(source_drawable, key),
            },
        );
        tracing::debug!(masked = %ticket.target, mask = %ticket.source, "Mask bound");
        true
    }

    /// Remove the mask from `target` and cancel any in-flight install.
    /// Returns false if nothing was bound.
    pub fn unbind(&mut self, target: EntityId) -> bool {
        self.bump(target);
        self.pending.remove(&target);
        let released = self.release(target);
        if released {
            tracing::debug!(masked = %target, "Mask unbound");
        }
        released
    }

    /// Cancel in-flight installs that use `source`
    pub fn cancel_pending_for_source(&mut self, source: EntityId) {
        let stale: Vec<EntityId> = self
            .pending
            .values()
            .filter(|ticket| ticket.source == source)
            .map(|ticket| ticket.target)
            .collect();
        for target in stale {
            self.pending.remove(&target);
            self.bump(target);
        }
    }

    /// Copy every source's placement onto its proxy and refresh the targets
    pub fn sync(&self) {
        for binding in self.bindings.values() {
            let Some(source) = binding.source_drawable.upgrade() else {
                continue;
            };
            let geometry = source.lock().geometry();
            follow(&binding.proxy, &geometry);
            if let Some(target) = binding.target_drawable.upgrade() {
                target.lock().set_coords();
            }
        }
    }

    /// Source masking `target`
    pub fn source_of(&self, target: EntityId) -> Option<EntityId> {
        self.bindings.get(&target).map(|b| b.source)
    }

    /// Targets masked by `source`
    pub fn targets_of(&self, source: EntityId) -> Vec<EntityId> {
        self.bindings
            .values()
            .filter(|b| b.source == source)
            .map(|b| b.target)
            .collect()
    }

    /// Binding for `target`
    pub fn binding(&self, target: EntityId) -> Option<&MaskBinding> {
        self.bindings.get(&target)
    }

    /// Number of installed masks
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no mask is installed
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Unbind everything and cancel all in-flight installs
    pub fn clear(&mut self) {
        let targets: Vec<EntityId> = self
            .bindings
            .keys()
            .chain(self.pending.keys())
            .copied()
            .collect();
        for target in targets {
            self.unbind(target);
        }
    }

    fn bump(&mut self, target: EntityId) -> u64 {
        let generation = self.generations.entry(target).or_insert(0);
        *generation += 1;
        *generation
    }

    fn release(&mut self, target: EntityId) -> bool {
        let Some(binding) = self.bindings.shift_remove(&target) else {
            return false;
        };

        if let Some(target_drawable) = binding.target_drawable.upgrade() {
            let mut t = target_drawable.lock();
            let installed = t
                .clip_path()
                .is_some_and(|clip| same_drawable(&clip, &binding.proxy));
            if installed {
                t.set_clip_path(None);
            }
            t.set_coords();
        }
        binding.proxy.lock().dispose();
        if let Some(source) = binding.source_drawable.upgrade() {
            let mut s = source.lock();
            s.set_visible(true);
            s.set_evented(true);
        }
        // dropping the binding releases the source listener
        drop(binding);
        true
    }
}

fn follow(proxy: &DrawableHandle, geometry: &Geometry) {
    let mut p = proxy.lock();
    p.set_geometry(geometry);
    p.set_coords();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::{into_handle, Drawable, GeometryEvent, HeadlessDrawable};
    use crate::keyframe::Property;

    fn pair() -> (EntityId, DrawableHandle, EntityId, DrawableHandle) {
        (
            EntityId::new(),
            into_handle(HeadlessDrawable::at(10.0, 10.0)),
            EntityId::new(),
            into_handle(HeadlessDrawable::at(0.0, 0.0)),
        )
    }

    fn clip_of(drawable: &DrawableHandle) -> Option<DrawableHandle> {
        drawable.lock().clip_path()
    }

    #[test]
    fn test_bind_installs_hidden_proxy() {
        let (target, target_d, source, source_d) = pair();
        let mut masks = MaskSync::new();
        assert!(masks.bind(target, &target_d, Some((source, &source_d))));

        let proxy = clip_of(&target_d).expect("clip installed");
        let p = proxy.lock();
        assert!(!p.visible());
        assert!(!p.evented());
        assert_eq!(p.identity(), Some(source));
        assert!(source_d.lock().visible());
        assert_eq!(masks.source_of(target), Some(source));
    }

    #[test]
    fn test_proxy_follows_source_on_sync() {
        let (target, target_d, source, source_d) = pair();
        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((source, &source_d)));

        {
            let mut s = source_d.lock();
            s.set(Property::Left, 50.0);
            s.set(Property::Top, 50.0);
        }
        masks.sync();

        let proxy = clip_of(&target_d).expect("clip installed");
        let p = proxy.lock();
        assert_eq!(p.get(Property::Left), 50.0);
        assert_eq!(p.get(Property::Top), 50.0);
    }

    #[test]
    fn test_proxy_follows_source_gestures() {
        let source_inner = Arc::new(parking_lot::Mutex::new(HeadlessDrawable::new()));
        let source_d: DrawableHandle = source_inner.clone();
        let target_d = into_handle(HeadlessDrawable::new());
        let (target, source) = (EntityId::new(), EntityId::new());

        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((source, &source_d)));

        source_inner.lock().drag_to(25.0, 75.0);
        let mut geometry = source_inner.lock().geometry;
        geometry.angle = 30.0;
        geometry.flip_x = true;
        source_inner.lock().geometry = geometry;
        source_inner.lock().emit(GeometryEvent::Rotating);

        let proxy = clip_of(&target_d).expect("clip installed");
        assert_eq!(proxy.lock().geometry(), geometry);
    }

    #[test]
    fn test_unbind_restores_and_releases() {
        let source_inner = Arc::new(parking_lot::Mutex::new(HeadlessDrawable::new()));
        let source_d: DrawableHandle = source_inner.clone();
        let target_d = into_handle(HeadlessDrawable::new());
        let (target, source) = (EntityId::new(), EntityId::new());

        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((source, &source_d)));
        assert_eq!(source_inner.lock().listener_count(), 1);
        source_inner.lock().visible = false;

        assert!(masks.unbind(target));
        assert!(clip_of(&target_d).is_none());
        assert!(source_inner.lock().visible);
        assert_eq!(source_inner.lock().listener_count(), 0);
        assert!(masks.is_empty());

        assert!(!masks.unbind(target));
    }

    #[test]
    fn test_rebind_replaces_previous_proxy() {
        let (target, target_d, source, source_d) = pair();
        let other = EntityId::new();
        let other_inner = Arc::new(parking_lot::Mutex::new(HeadlessDrawable::at(5.0, 5.0)));
        let other_d: DrawableHandle = other_inner.clone();

        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((other, &other_d)));
        let first = clip_of(&target_d).expect("clip installed");

        masks.bind(target, &target_d, Some((source, &source_d)));
        let second = clip_of(&target_d).expect("clip installed");

        assert!(!same_drawable(&first, &second));
        assert_eq!(other_inner.lock().listener_count(), 0);
        assert_eq!(masks.len(), 1);
        assert_eq!(masks.source_of(target), Some(source));
    }

    #[test]
    fn test_bind_to_self_unbinds() {
        let (target, target_d, source, source_d) = pair();
        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((source, &source_d)));

        assert!(!masks.bind(target, &target_d, Some((target, &target_d))));
        assert!(clip_of(&target_d).is_none());

        masks.bind(target, &target_d, Some((source, &source_d)));
        assert!(!masks.bind(target, &target_d, None));
        assert!(masks.is_empty());
    }

    #[test]
    fn test_stale_install_is_disposed() {
        let (target, target_d, source, source_d) = pair();
        let mut masks = MaskSync::new();

        let ticket = masks.request(target, source);
        let proxy_inner = Arc::new(parking_lot::Mutex::new(HeadlessDrawable::new()));
        let proxy: DrawableHandle = proxy_inner.clone();

        masks.cancel_pending_for_source(source);
        assert!(!masks.install(ticket, &target_d, &source_d, proxy));
        assert!(proxy_inner.lock().disposed);
        assert!(clip_of(&target_d).is_none());

        let older = masks.request(target, source);
        let newer = masks.request(target, source);
        assert!(!masks.is_current(&older));
        let proxy = source_d.lock().duplicate();
        assert!(masks.install(newer, &target_d, &source_d, proxy));
    }

    #[test]
    fn test_clear_releases_everything() {
        let (target, target_d, source, source_d) = pair();
        let mut masks = MaskSync::new();
        masks.bind(target, &target_d, Some((source, &source_d)));
        let pending = masks.request(EntityId::new(), source);

        masks.clear();
        assert!(masks.is_empty());
        assert!(!masks.is_current(&pending));
        assert!(clip_of(&target_d).is_none());
    }
}
