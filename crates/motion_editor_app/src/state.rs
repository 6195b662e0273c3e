// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor state management.
//!
//! This module contains the core editor state: the animatable entities and
//! their scene membership records, selection, the timeline clock, mask
//! bindings and the undo/redo history.
//!
//! Every scene mutation goes through [`EditorState::apply`], which records it
//! unless the origin is [`MutationOrigin::Replay`].

use crate::commands::{
    AddEntityCommand, CaptureScope, CommandError, EditorCommand, KeyframeCommand, KeyframeEdit,
    MaskCommand, RemoveEntityCommand, RestoreCommand, TransformCommand,
};
use crate::config::EngineConfig;
use crate::history::{
    EntityRecord, History, MutationOrigin, Operation, OperationGroup, StateSnapshot,
};
use indexmap::IndexMap;
use motion_editor_sequencer::{
    AnimatableEntity, Canvas, ColorProperty, DrawableHandle, Easing, EntityId, FrameScheduler,
    HeadlessCanvas, KeyframeId, KeyframeSpec, ManualScheduler, MaskSync, TimelineClock,
    TransformSnapshot, DELETE_EPSILON, INSERT_EPSILON,
};
use serde::{Deserialize, Serialize};

/// Entity selection state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Currently selected entities
    pub entities: Vec<EntityId>,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an entity is selected
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Replace the selection with one entity
    pub fn set(&mut self, id: EntityId) {
        self.entities.clear();
        self.entities.push(id);
    }

    /// Remove an entity from the selection
    pub fn remove(&mut self, id: &EntityId) {
        self.entities.retain(|e| e != id);
    }

    /// Check if the selection is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the primary (last) selected entity
    pub fn primary(&self) -> Option<&EntityId> {
        self.entities.last()
    }
}

/// Scene membership record for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Display name
    pub name: String,
    /// Keyframe times shown on the timeline
    pub keyframe_markers: Vec<f64>,
}

impl SceneRecord {
    /// Create a record with no markers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyframe_markers: Vec::new(),
        }
    }
}

/// Scene membership store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneData {
    /// Records by entity, in insertion order
    pub records: IndexMap<EntityId, SceneRecord>,
}

impl SceneData {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by ID
    pub fn get(&self, id: &EntityId) -> Option<&SceneRecord> {
        self.records.get(id)
    }

    /// Get a mutable reference to a record by ID
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut SceneRecord> {
        self.records.get_mut(id)
    }

    /// Insert or replace a record
    pub fn insert(&mut self, id: EntityId, record: SceneRecord) {
        self.records.insert(id, record);
    }

    /// Remove a record
    pub fn remove(&mut self, id: &EntityId) -> Option<SceneRecord> {
        self.records.shift_remove(id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the scene is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A transform gesture in progress
#[derive(Debug, Clone)]
pub struct PendingTransform {
    entity: EntityId,
    before: StateSnapshot,
}

impl PendingTransform {
    /// Entity being transformed
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

/// Main editor state
pub struct EditorState {
    /// Engine configuration
    pub config: EngineConfig,

    /// Current entity selection
    pub selection: Selection,

    /// Scene membership records
    pub scene: SceneData,

    /// Undo/redo history
    pub history: History,

    /// Mask bindings
    pub masks: MaskSync,

    entities: IndexMap<EntityId, AnimatableEntity>,
    clock: TimelineClock,
    canvas: Box<dyn Canvas>,
}

impl EditorState {
    /// Create an editor drawing into `canvas` and requesting frames from `scheduler`
    pub fn new(
        config: EngineConfig,
        canvas: Box<dyn Canvas>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        let clock = TimelineClock::new(config.timeline_duration, config.frame_rate, scheduler);
        Self {
            history: History::with_max_depth(config.history_depth),
            config,
            selection: Selection::new(),
            scene: SceneData::new(),
            masks: MaskSync::new(),
            entities: IndexMap::new(),
            clock,
            canvas,
        }
    }

    /// Create an editor backed by a headless canvas and manual frame scheduler
    pub fn headless(config: EngineConfig) -> Self {
        Self::new(
            config,
            Box::new(HeadlessCanvas::new()),
            Box::new(ManualScheduler::new()),
        )
    }

    // ========================================================================
    // Command execution
    // ========================================================================

    /// Run a command.
    ///
    /// User mutations capture the command's scope before and after execution
    /// and record one history action. Replays only execute. Returns whether
    /// an action was recorded.
    pub fn apply(
        &mut self,
        command: &dyn EditorCommand,
        origin: MutationOrigin,
    ) -> Result<bool, CommandError> {
        if origin == MutationOrigin::Replay {
            command.execute(self)?;
            return Ok(false);
        }

        let before = self.capture(command.target(), command.scope())?;
        self.apply_captured(command, before)
    }

    /// Run a user command, logging failures. Returns whether it was recorded.
    pub fn run(&mut self, command: &dyn EditorCommand) -> bool {
        match self.apply(command, MutationOrigin::User) {
            Ok(recorded) => recorded,
            Err(err) => {
                tracing::warn!("{} rejected: {}", command.description(), err);
                false
            }
        }
    }

    /// Run several user commands as one history action.
    ///
    /// If a command fails, the ones already run are rolled back and nothing
    /// is recorded.
    pub fn apply_group(
        &mut self,
        description: impl Into<String>,
        commands: &[&dyn EditorCommand],
    ) -> Result<bool, CommandError> {
        let group_id = self.history.begin_operation();
        let mut group = OperationGroup::new(group_id, description.into());

        for command in commands {
            match self.step(*command) {
                Ok(operation) => group.add_operation(operation),
                Err(err) => {
                    self.replay(group.undo_snapshots().cloned().collect());
                    return Err(err);
                }
            }
        }
        self.refresh_view();
        Ok(self.history.record(group))
    }

    fn apply_captured(
        &mut self,
        command: &dyn EditorCommand,
        before: StateSnapshot,
    ) -> Result<bool, CommandError> {
        command.execute(self)?;
        let after = self.capture(command.target(), command.scope())?;
        self.refresh_view();

        let id = self.history.begin_operation();
        let mut group = OperationGroup::new(id, command.description().to_string());
        group.add_operation(Operation::new(
            id,
            command.description().to_string(),
            before,
            after,
        ));
        Ok(self.history.record(group))
    }

    fn step(&mut self, command: &dyn EditorCommand) -> Result<Operation, CommandError> {
        let before = self.capture(command.target(), command.scope())?;
        command.execute(self)?;
        let after = self.capture(command.target(), command.scope())?;
        let id = self.history.begin_operation();
        Ok(Operation::new(
            id,
            command.description().to_string(),
            before,
            after,
        ))
    }

    /// Capture one slice of state for an entity
    pub fn capture(&self, id: EntityId, scope: CaptureScope) -> Result<StateSnapshot, CommandError> {
        match scope {
            CaptureScope::Entity => Ok(match self.entities.get(&id) {
                Some(entity) => StateSnapshot::Entity(EntityRecord {
                    id,
                    scene: self.scene.get(&id).cloned().unwrap_or_default(),
                    drawable: entity.drawable().clone(),
                    tracks: entity.tracks().clone(),
                    transform: entity.snapshot(),
                }),
                None => StateSnapshot::Absent(id),
            }),
            CaptureScope::Tracks | CaptureScope::Transform => {
                let entity = self
                    .entities
                    .get(&id)
                    .ok_or(CommandError::EntityNotFound(id))?;
                Ok(StateSnapshot::Tracks {
                    entity: id,
                    tracks: entity.tracks().clone(),
                    scene: self.scene.get(&id).cloned().unwrap_or_default(),
                    transform: (scope == CaptureScope::Transform).then(|| entity.snapshot()),
                })
            }
            CaptureScope::Mask => Ok(StateSnapshot::Mask {
                target: id,
                source: self.masks.source_of(id),
            }),
        }
    }

    /// Put a captured snapshot back in place
    pub(crate) fn restore(&mut self, snapshot: &StateSnapshot) -> Result<(), CommandError> {
        match snapshot {
            StateSnapshot::Absent(id) => {
                self.detach(*id);
            }
            StateSnapshot::Entity(record) => {
                self.detach(record.id);
                let entity = AnimatableEntity::with_tracks(
                    record.id,
                    record.drawable.clone(),
                    record.tracks.clone(),
                );
                entity.apply_snapshot(&record.transform);
                self.attach(entity, record.scene.clone());
                self.selection.set(record.id);
            }
            StateSnapshot::Tracks {
                entity: id,
                tracks,
                scene,
                transform,
            } => {
                let time = self.clock.playhead();
                let entity = self
                    .entities
                    .get_mut(id)
                    .ok_or(CommandError::EntityNotFound(*id))?;
                entity.set_tracks(tracks.clone());
                match transform {
                    Some(transform) => entity.apply_snapshot(transform),
                    None => entity.seek(time),
                }
                self.scene.insert(*id, scene.clone());
            }
            StateSnapshot::Mask { target, source } => {
                self.bind_mask(*target, *source)?;
            }
        }
        Ok(())
    }

    fn replay(&mut self, snapshots: Vec<StateSnapshot>) {
        for snapshot in snapshots {
            let entity = snapshot.entity();
            if let Err(err) = self.apply(&RestoreCommand::new(snapshot), MutationOrigin::Replay) {
                tracing::warn!(%entity, "Replay skipped: {}", err);
            }
        }
        self.refresh_view();
    }

    /// Bring mask proxies up to date and request one render
    fn refresh_view(&mut self) {
        self.masks.sync();
        self.canvas.request_render();
    }

    /// Insert an entity, its scene record and its drawable
    pub(crate) fn attach(&mut self, entity: AnimatableEntity, mut record: SceneRecord) {
        let id = entity.id();
        record.keyframe_markers = entity.markers();
        self.canvas.add(entity.drawable());
        self.entities.insert(id, entity);
        self.scene.insert(id, record);
        tracing::debug!(entity = %id, "Entity attached");
    }

    /// Take an entity out of the scene, releasing every mask it takes part in
    pub(crate) fn detach(&mut self, id: EntityId) -> Option<AnimatableEntity> {
        let entity = self.entities.shift_remove(&id)?;

        self.masks.unbind(id);
        for target in self.masks.targets_of(id) {
            self.masks.unbind(target);
        }
        self.masks.cancel_pending_for_source(id);

        self.canvas.remove(entity.drawable());
        self.scene.remove(&id);
        self.selection.remove(&id);
        tracing::debug!(entity = %id, "Entity detached");
        Some(entity)
    }

    /// Bind or clear the mask on `target`
    pub(crate) fn bind_mask(
        &mut self,
        target: EntityId,
        source: Option<EntityId>,
    ) -> Result<(), CommandError> {
        let target_drawable = self
            .entities
            .get(&target)
            .ok_or(CommandError::EntityNotFound(target))?
            .drawable()
            .clone();

        match source {
            None => {
                self.masks.unbind(target);
            }
            Some(source) => {
                let source_drawable = self
                    .entities
                    .get(&source)
                    .ok_or(CommandError::EntityNotFound(source))?
                    .drawable()
                    .clone();
                self.masks
                    .bind(target, &target_drawable, Some((source, &source_drawable)));
            }
        }
        Ok(())
    }

    /// Refresh the cached timeline markers of an entity
    pub(crate) fn refresh_markers(&mut self, id: EntityId) {
        let markers = self.entities.get(&id).map(AnimatableEntity::markers);
        if let (Some(markers), Some(record)) = (markers, self.scene.get_mut(&id)) {
            record.keyframe_markers = markers;
        }
    }

    // ========================================================================
    // Scene edits
    // ========================================================================

    /// Add a drawable to the scene and select it
    pub fn add_entity(&mut self, name: impl Into<String>, drawable: DrawableHandle) -> EntityId {
        let id = EntityId::new();
        self.run(&AddEntityCommand::new(id, name, drawable));
        id
    }

    /// Remove an entity, clearing every mask it takes part in, as one action
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            tracing::warn!(entity = %id, "Remove of unknown entity ignored");
            return false;
        }

        let name = self
            .scene
            .get(&id)
            .map(|record| record.name.clone())
            .unwrap_or_default();

        let mut unmask: Vec<MaskCommand> = Vec::new();
        if self.masks.source_of(id).is_some() {
            unmask.push(MaskCommand::new(id, None));
        }
        unmask.extend(
            self.masks
                .targets_of(id)
                .into_iter()
                .map(|target| MaskCommand::new(target, None)),
        );

        let remove = RemoveEntityCommand::new(id, format!("Remove {name}"));
        let mut commands: Vec<&dyn EditorCommand> = unmask
            .iter()
            .map(|command| command as &dyn EditorCommand)
            .collect();
        commands.push(&remove);

        match self.apply_group(format!("Remove {name}"), &commands) {
            Ok(recorded) => recorded,
            Err(err) => {
                tracing::warn!(entity = %id, "Remove failed: {}", err);
                false
            }
        }
    }

    /// Start a transform gesture by capturing the entity's current state
    pub fn begin_transform(&self, id: EntityId) -> Option<PendingTransform> {
        match self.capture(id, CaptureScope::Transform) {
            Ok(before) => Some(PendingTransform { entity: id, before }),
            Err(err) => {
                tracing::warn!(entity = %id, "Transform not started: {}", err);
                None
            }
        }
    }

    /// Finish a transform gesture: key the live pose at the playhead and
    /// record one action
    pub fn commit_transform(&mut self, pending: PendingTransform) -> bool {
        let command = TransformCommand::new(pending.entity, None);
        match self.apply_captured(&command, pending.before) {
            Ok(recorded) => recorded,
            Err(err) => {
                tracing::warn!(entity = %pending.entity, "Transform not committed: {}", err);
                false
            }
        }
    }

    /// Set an entity's pose and key it at the playhead
    pub fn set_transform(&mut self, id: EntityId, transform: TransformSnapshot) -> bool {
        self.run(&TransformCommand::new(id, Some(transform)))
    }

    /// Key one numeric property. Returns the ID of the keyframe now at that time.
    pub fn add_keyframe(&mut self, id: EntityId, spec: KeyframeSpec) -> Option<KeyframeId> {
        if !self.run(&KeyframeCommand::new(id, KeyframeEdit::Add(spec))) {
            return None;
        }
        let time = if spec.time.is_finite() { spec.time } else { 0.0 };
        self.entities
            .get(&id)?
            .tracks()
            .track(spec.property)?
            .nearest(time, INSERT_EPSILON)
            .map(|keyframe| keyframe.id)
    }

    /// Key one color property. Returns the ID of the keyframe now at that time.
    pub fn add_color_keyframe(
        &mut self,
        id: EntityId,
        property: ColorProperty,
        time: f64,
        value: impl Into<String>,
        easing: Easing,
    ) -> Option<KeyframeId> {
        let edit = KeyframeEdit::AddColor {
            property,
            time,
            value: value.into(),
            easing,
        };
        if !self.run(&KeyframeCommand::new(id, edit)) {
            return None;
        }
        let time = if time.is_finite() { time } else { 0.0 };
        self.entities
            .get(&id)?
            .tracks()
            .color_track(property)?
            .nearest(time, INSERT_EPSILON)
            .map(|keyframe| keyframe.id)
    }

    /// Delete every numeric keyframe of an entity near `time`.
    /// Nothing is recorded if no keyframe is there.
    pub fn delete_keyframes_at(&mut self, id: EntityId, time: f64) -> bool {
        if !self.has_any_keyframe_at_time(id, time) {
            return false;
        }
        self.run(&KeyframeCommand::new(
            id,
            KeyframeEdit::DeleteAt {
                time,
                epsilon: DELETE_EPSILON,
            },
        ))
    }

    /// Mask `target` by `source`, or clear its mask with `None`.
    /// A source equal to the target clears the mask.
    pub fn set_mask(&mut self, target: EntityId, source: Option<EntityId>) -> bool {
        let source = source.filter(|source| *source != target);
        if self.masks.source_of(target) == source {
            return false;
        }
        self.run(&MaskCommand::new(target, source))
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Undo the last action
    pub fn try_undo(&mut self) -> Result<(), CommandError> {
        let group = self.history.undo()?;
        self.replay(group.undo_snapshots().cloned().collect());
        tracing::debug!("Undo: {}", group.description);
        Ok(())
    }

    /// Redo the last undone action
    pub fn try_redo(&mut self) -> Result<(), CommandError> {
        let group = self.history.redo()?;
        self.replay(group.redo_snapshots().cloned().collect());
        tracing::debug!("Redo: {}", group.description);
        Ok(())
    }

    /// Undo the last action. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.try_undo().is_ok()
    }

    /// Redo the last undone action. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.try_redo().is_ok()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Start playback at host time `now`
    pub fn play(&mut self, now: f64) -> bool {
        self.clock.play(now)
    }

    /// Pause playback
    pub fn pause(&mut self) -> bool {
        self.clock.pause()
    }

    /// Toggle play/pause
    pub fn toggle_playback(&mut self, now: f64) {
        self.clock.toggle(now);
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        let time = self.clock.stop();
        self.publish(time);
    }

    /// Handle an animation frame. Returns the published time while playing.
    pub fn on_frame(&mut self, now: f64) -> Option<f64> {
        let time = self.clock.tick(now)?;
        self.publish(time);
        Some(time)
    }

    /// Move the playhead and publish the new time
    pub fn scrub(&mut self, time: f64) -> f64 {
        let time = self.clock.scrub(time);
        self.publish(time);
        time
    }

    /// Seek every entity to `time`, resync masks, then request one render
    fn publish(&mut self, time: f64) {
        for entity in self.entities.values() {
            entity.seek(time);
        }
        self.masks.sync();
        self.canvas.request_render();
        tracing::trace!(time, entities = self.entities.len(), "Published");
    }

    /// Cancel the pending frame and release every mask proxy
    pub fn dispose(&mut self) {
        self.clock.shutdown();
        self.masks.clear();
        tracing::debug!("Editor disposed");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get an entity
    pub fn entity(&self, id: EntityId) -> Option<&AnimatableEntity> {
        self.entities.get(&id)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut AnimatableEntity> {
        self.entities.get_mut(&id)
    }

    /// Iterate entities in insertion order
    pub fn entities(&self) -> impl Iterator<Item = &AnimatableEntity> {
        self.entities.values()
    }

    /// Check if an entity is in the scene
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Current playhead time
    pub fn playhead(&self) -> f64 {
        self.clock.playhead()
    }

    /// The timeline clock
    pub fn clock(&self) -> &TimelineClock {
        &self.clock
    }

    /// Live pose of an entity
    pub fn snapshot(&self, id: EntityId) -> Option<TransformSnapshot> {
        self.entities.get(&id).map(AnimatableEntity::snapshot)
    }

    /// Check if an entity has any numeric keyframe near `time`
    pub fn has_any_keyframe_at_time(&self, id: EntityId, time: f64) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|entity| entity.has_any_keyframe_at_time(time, DELETE_EPSILON))
    }
}

impl Drop for EditorState {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_editor_sequencer::{into_handle, same_drawable, Drawable, HeadlessDrawable, Property};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn editor() -> (EditorState, Arc<Mutex<HeadlessCanvas>>) {
        let canvas = Arc::new(Mutex::new(HeadlessCanvas::new()));
        let state = EditorState::new(
            EngineConfig::default(),
            Box::new(canvas.clone()),
            Box::new(ManualScheduler::new()),
        );
        (state, canvas)
    }

    fn moved(state: &EditorState, id: EntityId, left: f64, top: f64) -> TransformSnapshot {
        let mut pose = state.snapshot(id).unwrap_or_default();
        pose.left = left;
        pose.top = top;
        pose
    }

    #[test]
    fn test_history_round_trip() {
        let (mut state, canvas) = editor();
        let x = state.add_entity("X", into_handle(HeadlessDrawable::at(10.0, 20.0)));
        let pose = moved(&state, x, 300.0, 20.0);
        assert!(state.set_transform(x, pose));

        assert!(state.undo());
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(10.0));
        assert!(state.undo());
        assert!(!state.contains(x));
        assert!(state.scene.get(&x).is_none());
        assert!(canvas.lock().is_empty());
        assert!(state.selection.is_empty());

        assert!(state.redo());
        assert!(state.contains(x));
        assert_eq!(state.selection.primary(), Some(&x));
        assert!(state.redo());
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(300.0));
        assert_eq!(canvas.lock().len(), 1);

        assert!(!state.redo());
    }

    #[test]
    fn test_redo_invalidated_by_new_action() {
        let (mut state, _) = editor();
        let x = state.add_entity("X", into_handle(HeadlessDrawable::new()));
        state.set_transform(x, moved(&state, x, 50.0, 0.0));
        state.undo();
        assert!(state.history.can_redo());

        state.set_transform(x, moved(&state, x, 75.0, 0.0));
        assert!(!state.history.can_redo());
        assert!(!state.redo());
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(75.0));
    }

    #[test]
    fn test_underflow_is_a_no_op() {
        let (mut state, _) = editor();
        assert!(!state.undo());
        assert!(!state.redo());
        assert!(matches!(
            state.try_undo(),
            Err(CommandError::History(crate::history::HistoryError::NothingToUndo))
        ));
    }

    #[test]
    fn test_undo_does_not_record() {
        let (mut state, _) = editor();
        let x = state.add_entity("X", into_handle(HeadlessDrawable::new()));
        state.set_transform(x, moved(&state, x, 1.0, 1.0));
        assert_eq!(state.history.undo_depth(), 2);

        state.undo();
        assert_eq!(state.history.undo_depth(), 1);
        assert_eq!(state.history.redo_depth(), 1);
    }

    #[test]
    fn test_mask_follows_source_after_tick() {
        let (mut state, canvas) = editor();
        let target = state.add_entity("Photo", into_handle(HeadlessDrawable::at(10.0, 10.0)));
        let source = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        assert!(state.set_mask(target, Some(source)));

        state.set_transform(source, moved(&state, source, 50.0, 50.0));
        state.play(0.0);
        let renders = canvas.lock().render_requests();
        assert!(state.on_frame(0.016).is_some());
        assert_eq!(canvas.lock().render_requests(), renders + 1);

        let binding = state.masks.binding(target).expect("mask bound");
        let proxy = binding.proxy().lock();
        assert_eq!(proxy.get(Property::Left), 50.0);
        assert_eq!(proxy.get(Property::Top), 50.0);
    }

    #[test]
    fn test_clear_mask_restores_source() {
        let (mut state, _) = editor();
        let target = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let source_drawable = into_handle(HeadlessDrawable::new());
        let source = state.add_entity("Circle", source_drawable.clone());
        state.set_mask(target, Some(source));
        source_drawable.lock().set_visible(false);

        assert!(state.set_mask(target, None));
        let photo_drawable = state
            .entity(target)
            .map(|e| e.drawable().clone())
            .expect("target exists");
        assert!(photo_drawable.lock().clip_path().is_none());
        assert!(source_drawable.lock().visible());
        assert!(!state.set_mask(target, None));
    }

    #[test]
    fn test_mask_undo_rebinds_through_ids() {
        let (mut state, _) = editor();
        let target = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let source = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        state.set_mask(target, Some(source));
        let first = state.masks.binding(target).map(|b| b.proxy().clone());

        state.undo();
        assert!(state.masks.is_empty());
        state.redo();
        assert_eq!(state.masks.source_of(target), Some(source));

        let second = state.masks.binding(target).map(|b| b.proxy().clone());
        let fresh = match (first, second) {
            (Some(a), Some(b)) => !same_drawable(&a, &b),
            _ => false,
        };
        assert!(fresh);
    }

    #[test]
    fn test_remove_mask_source_is_one_action() {
        let (mut state, _) = editor();
        let target = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let source = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        state.set_mask(target, Some(source));
        let depth = state.history.undo_depth();

        assert!(state.remove_entity(source));
        assert!(!state.contains(source));
        assert!(state.masks.is_empty());
        assert_eq!(state.history.undo_depth(), depth + 1);

        assert!(state.undo());
        assert!(state.contains(source));
        assert_eq!(state.masks.source_of(target), Some(source));
    }

    #[test]
    fn test_remove_unknown_entity_is_ignored() {
        let (mut state, _) = editor();
        assert!(!state.remove_entity(EntityId::new()));
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_history_capacity_evicts_oldest() {
        let config = EngineConfig {
            history_depth: 3,
            ..Default::default()
        };
        let mut state = EditorState::headless(config);
        let x = state.add_entity("X", into_handle(HeadlessDrawable::new()));
        for step in 1..=5 {
            state.set_transform(x, moved(&state, x, step as f64 * 10.0, 0.0));
        }

        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert!(state.contains(x));
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(20.0));
    }

    #[test]
    fn test_transform_gesture_records_live_pose() {
        let (mut state, _) = editor();
        let inner = Arc::new(Mutex::new(HeadlessDrawable::at(0.0, 0.0)));
        let drawable: DrawableHandle = inner.clone();
        let x = state.add_entity("X", drawable);

        let pending = state.begin_transform(x).expect("entity exists");
        inner.lock().drag_to(40.0, 60.0);
        assert!(state.commit_transform(pending));

        let markers = state.scene.get(&x).map(|r| r.keyframe_markers.clone());
        assert_eq!(markers, Some(vec![0.0]));
        state.scrub(1.0);
        assert_eq!(state.snapshot(x).map(|s| s.top), Some(60.0));

        state.undo();
        assert_eq!(state.snapshot(x).map(|s| s.top), Some(0.0));
        assert!(state.begin_transform(EntityId::new()).is_none());
    }

    #[test]
    fn test_keyframe_edits_record_and_seek() {
        let (mut state, _) = editor();
        let x = state.add_entity("X", into_handle(HeadlessDrawable::new()));
        let id = state
            .add_keyframe(x, KeyframeSpec::new(Property::Left, 2.0, 200.0))
            .expect("keyframe added");
        let kf = state.entity(x).and_then(|e| e.tracks().keyframe(id).cloned());
        assert_eq!(kf.map(|k| k.value), Some(200.0));

        state.scrub(1.0);
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(100.0));
        assert_eq!(
            state.scene.get(&x).map(|r| r.keyframe_markers.clone()),
            Some(vec![0.0, 2.0])
        );

        let color =
            state.add_color_keyframe(x, ColorProperty::Fill, 1.0, "#ff0000", Easing::EaseIn);
        assert!(color.is_some());

        assert!(!state.delete_keyframes_at(x, 5.0));
        assert!(state.delete_keyframes_at(x, 2.01));
        assert!(!state.has_any_keyframe_at_time(x, 2.0));

        state.undo();
        assert!(state.has_any_keyframe_at_time(x, 2.0));
        let ghost = KeyframeSpec::new(Property::Top, 0.0, 1.0);
        assert!(state.add_keyframe(EntityId::new(), ghost).is_none());
    }

    #[test]
    fn test_pause_holds_and_stop_rewinds() {
        let (mut state, _) = editor();
        let x = state.add_entity("X", into_handle(HeadlessDrawable::new()));
        state.add_keyframe(x, KeyframeSpec::new(Property::Left, 4.0, 400.0));

        state.play(0.0);
        state.on_frame(1.0);
        assert!(state.pause());
        assert_eq!(state.on_frame(3.0), None);
        assert_eq!(state.playhead(), 1.0);
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(100.0));

        state.stop();
        assert_eq!(state.playhead(), 0.0);
        assert_eq!(state.snapshot(x).map(|s| s.left), Some(0.0));
    }

    #[test]
    fn test_toggle_playback_resumes_from_now() {
        let (mut state, _) = editor();
        state.toggle_playback(10.0);
        assert!(!state.clock().is_paused());
        assert_eq!(state.on_frame(10.5), Some(0.5));

        state.toggle_playback(11.0);
        assert!(state.clock().is_paused());
        assert_eq!(state.on_frame(20.0), None);

        state.toggle_playback(30.0);
        assert_eq!(state.on_frame(30.25), Some(0.75));
    }

    #[test]
    fn test_failed_group_rolls_back() {
        let (mut state, _) = editor();
        let photo = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let circle = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        let depth = state.history.undo_depth();

        let mask = MaskCommand::new(photo, Some(circle));
        let ghost = TransformCommand::new(EntityId::new(), None);
        let result = state.apply_group("Mask and move", &[&mask, &ghost]);

        assert!(matches!(result, Err(CommandError::EntityNotFound(_))));
        assert!(state.masks.is_empty());
        assert_eq!(state.history.undo_depth(), depth);
        assert!(!state.history.can_redo());
        let photo_drawable = state
            .entity(photo)
            .map(|e| e.drawable().clone())
            .expect("photo exists");
        assert!(photo_drawable.lock().clip_path().is_none());
    }

    #[test]
    fn test_paused_edit_resyncs_mask_proxy() {
        let (mut state, canvas) = editor();
        let photo = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let circle = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        state.set_mask(photo, Some(circle));
        let renders = canvas.lock().render_requests();

        state.set_transform(circle, moved(&state, circle, 70.0, 30.0));
        assert!(state.clock().is_paused());
        assert_eq!(canvas.lock().render_requests(), renders + 1);

        let binding = state.masks.binding(photo).expect("mask bound");
        let proxy = binding.proxy().lock();
        assert_eq!(proxy.get(Property::Left), 70.0);
        assert_eq!(proxy.get(Property::Top), 30.0);
    }

    #[test]
    fn test_dispose_releases_masks_and_frame() {
        let (mut state, _) = editor();
        let target = state.add_entity("Photo", into_handle(HeadlessDrawable::new()));
        let source = state.add_entity("Circle", into_handle(HeadlessDrawable::new()));
        state.set_mask(target, Some(source));
        state.play(0.0);

        state.dispose();
        assert!(state.masks.is_empty());
        assert!(!state.clock().has_pending_frame());
        assert!(state.clock().is_paused());
    }
}
