// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor commands for undo/redo support.
//!
//! A command names the entity it touches and the slice of state it changes
//! ([`CaptureScope`]). [`EditorState::apply`] captures that slice before and
//! after execution and records the pair as one history operation.

use crate::history::{HistoryError, StateSnapshot};
use crate::state::{EditorState, SceneRecord};
use motion_editor_sequencer::{
    AnimatableEntity, ColorProperty, DrawableHandle, Easing, EntityId, KeyframeSpec,
    TransformSnapshot,
};

/// Slice of editor state a command changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureScope {
    /// Scene membership: the whole entity, or its absence
    Entity,
    /// The entity's tracks and scene record
    Tracks,
    /// Tracks plus the live drawable transform
    Transform,
    /// The entity's mask source
    Mask,
}

/// Trait for editor commands that can be undone/redone
pub trait EditorCommand: Send + Sync {
    /// Get a description of this command
    fn description(&self) -> &str;

    /// Entity the command changes
    fn target(&self) -> EntityId;

    /// State captured around execution
    fn scope(&self) -> CaptureScope;

    /// Execute the command
    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError>;
}

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// History error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity already in the scene
    #[error("Entity already exists: {0}")]
    EntityExists(EntityId),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Command to add a drawable to the scene as an animatable entity.
///
/// The new entity gets one keyframe per numeric property at the playhead,
/// taken from the drawable's current values.
#[derive(Debug, Clone)]
pub struct AddEntityCommand {
    /// ID for the new entity
    pub entity: EntityId,
    /// Display name
    pub name: String,
    /// Host drawable
    pub drawable: DrawableHandle,
    /// Whether to select the new entity
    pub select: bool,
    description: String,
}

impl AddEntityCommand {
    /// Create a new add command
    pub fn new(entity: EntityId, name: impl Into<String>, drawable: DrawableHandle) -> Self {
        let name = name.into();
        Self {
            entity,
            description: format!("Add {name}"),
            name,
            drawable,
            select: true,
        }
    }

    /// Set whether the entity is selected once added
    pub fn with_select(mut self, select: bool) -> Self {
        self.select = select;
        self
    }
}

impl EditorCommand for AddEntityCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn target(&self) -> EntityId {
        self.entity
    }

    fn scope(&self) -> CaptureScope {
        CaptureScope::Entity
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        if state.contains(self.entity) {
            return Err(CommandError::EntityExists(self.entity));
        }

        let mut entity = AnimatableEntity::new(self.entity, self.drawable.clone());
        let pose = entity.snapshot();
        entity.add_snapshot_keyframe(state.playhead(), &pose);

        state.attach(entity, SceneRecord::new(self.name.clone()));
        if self.select {
            state.selection.set(self.entity);
        }
        Ok(())
    }
}

/// Command to take an entity out of the scene.
///
/// Refuses entities that mask or are masked by another entity, since the
/// captured snapshot holds no mask relations. `EditorState::remove_entity`
/// clears those masks first, in the same history action.
#[derive(Debug, Clone)]
pub struct RemoveEntityCommand {
    /// Entity to remove
    pub entity: EntityId,
    description: String,
}

impl RemoveEntityCommand {
    /// Create a new remove command
    pub fn new(entity: EntityId, description: impl Into<String>) -> Self {
        Self {
            entity,
            description: description.into(),
        }
    }
}

impl EditorCommand for RemoveEntityCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn target(&self) -> EntityId {
        self.entity
    }

    fn scope(&self) -> CaptureScope {
        CaptureScope::Entity
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        if state.masks.source_of(self.entity).is_some()
            || !state.masks.targets_of(self.entity).is_empty()
        {
            return Err(CommandError::InvalidOperation(format!(
                "entity {} is part of a mask; clear the mask first",
                self.entity
            )));
        }
        state
            .detach(self.entity)
            .map(|_| ())
            .ok_or(CommandError::EntityNotFound(self.entity))
    }
}

/// Command to key an entity's pose at the playhead.
///
/// With a transform, the values are written to the drawable first. Without
/// one, the drawable's live pose (for example after a drag) is keyed.
#[derive(Debug, Clone)]
pub struct TransformCommand {
    /// Entity being transformed
    pub entity: EntityId,
    /// New pose, or `None` to key the live pose
    pub transform: Option<TransformSnapshot>,
    description: String,
}

impl TransformCommand {
    /// Create a new transform command
    pub fn new(entity: EntityId, transform: Option<TransformSnapshot>) -> Self {
        Self {
            entity,
            transform,
            description: "Transform".to_string(),
        }
    }
}

impl EditorCommand for TransformCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn target(&self) -> EntityId {
        self.entity
    }

    fn scope(&self) -> CaptureScope {
        CaptureScope::Transform
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        let time = state.playhead();
        let Some(entity) = state.entity_mut(self.entity) else {
            return Err(CommandError::EntityNotFound(self.entity));
        };

        if let Some(transform) = &self.transform {
            entity.apply_snapshot(transform);
        }
        let pose = entity.snapshot();
        entity.add_snapshot_keyframe(time, &pose);

        state.refresh_markers(self.entity);
        Ok(())
    }
}

/// Track edit carried by a [`KeyframeCommand`]
#[derive(Debug, Clone)]
pub enum KeyframeEdit {
    /// Key one numeric property
    Add(KeyframeSpec),
    /// Key one color property
    AddColor {
        /// Color property
        property: ColorProperty,
        /// Time in seconds
        time: f64,
        /// Color string
        value: String,
        /// Easing tag
        easing: Easing,
    },
    /// Remove numeric keyframes near a time
    DeleteAt {
        /// Time in seconds
        time: f64,
        /// Match distance
        epsilon: f64,
    },
}

/// Command to edit an entity's tracks
#[derive(Debug, Clone)]
pub struct KeyframeCommand {
    /// Entity whose tracks change
    pub entity: EntityId,
    /// The edit
    pub edit: KeyframeEdit,
}

impl KeyframeCommand {
    /// Create a new keyframe command
    pub fn new(entity: EntityId, edit: KeyframeEdit) -> Self {
        Self { entity, edit }
    }
}

impl EditorCommand for KeyframeCommand {
    fn description(&self) -> &str {
        match self.edit {
            KeyframeEdit::Add(_) => "Add keyframe",
            KeyframeEdit::AddColor { .. } => "Add color keyframe",
            KeyframeEdit::DeleteAt { .. } => "Delete keyframes",
        }
    }

    fn target(&self) -> EntityId {
        self.entity
    }

    fn scope(&self) -> CaptureScope {
        CaptureScope::Tracks
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        let time = state.playhead();
        let Some(entity) = state.entity_mut(self.entity) else {
            return Err(CommandError::EntityNotFound(self.entity));
        };

        match &self.edit {
            KeyframeEdit::Add(spec) => {
                entity.add_keyframe(*spec);
            }
            KeyframeEdit::AddColor {
                property,
                time,
                value,
                easing,
            } => {
                entity.add_color_keyframe(*property, *time, value.clone(), *easing);
            }
            KeyframeEdit::DeleteAt { time, epsilon } => {
                entity.delete_keyframe_at_time(*time, *epsilon);
            }
        }
        entity.seek(time);

        state.refresh_markers(self.entity);
        Ok(())
    }
}

/// Command to mask one entity by another, or clear its mask
#[derive(Debug, Clone)]
pub struct MaskCommand {
    /// Entity being masked
    pub target: EntityId,
    /// Mask source, `None` to unmask
    pub source: Option<EntityId>,
}

impl MaskCommand {
    /// Create a new mask command
    pub fn new(target: EntityId, source: Option<EntityId>) -> Self {
        Self { target, source }
    }
}

impl EditorCommand for MaskCommand {
    fn description(&self) -> &str {
        if self.source.is_some() {
            "Set mask"
        } else {
            "Clear mask"
        }
    }

    fn target(&self) -> EntityId {
        self.target
    }

    fn scope(&self) -> CaptureScope {
        CaptureScope::Mask
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        state.bind_mask(self.target, self.source)
    }
}

/// Command that puts a captured snapshot back in place
#[derive(Debug, Clone)]
pub struct RestoreCommand {
    /// Snapshot to restore
    pub snapshot: StateSnapshot,
}

impl RestoreCommand {
    /// Create a new restore command
    pub fn new(snapshot: StateSnapshot) -> Self {
        Self { snapshot }
    }
}

impl EditorCommand for RestoreCommand {
    fn description(&self) -> &str {
        "Restore"
    }

    fn target(&self) -> EntityId {
        self.snapshot.entity()
    }

    fn scope(&self) -> CaptureScope {
        match &self.snapshot {
            StateSnapshot::Absent(_) | StateSnapshot::Entity(_) => CaptureScope::Entity,
            StateSnapshot::Tracks {
                transform: Some(_), ..
            } => CaptureScope::Transform,
            StateSnapshot::Tracks { .. } => CaptureScope::Tracks,
            StateSnapshot::Mask { .. } => CaptureScope::Mask,
        }
    }

    fn execute(&self, state: &mut EditorState) -> Result<(), CommandError> {
        state.restore(&self.snapshot)
    }
}
