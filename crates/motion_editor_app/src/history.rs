// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history built from before/after state snapshots.
//!
//! Each recorded operation holds two [`StateSnapshot`]s: undo restores
//! `before`, redo restores `after`. Snapshots are plain values (cloned track
//! sets, scene records, mask source ids), never copies of mask proxies.

use crate::state::SceneRecord;
use motion_editor_sequencer::{DrawableHandle, EntityId, TrackSet, TransformSnapshot};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Where a mutation comes from.
///
/// Only user mutations are recorded; replays of stored snapshots are not, or
/// every undo would push a new action and wipe the redo stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    /// Fresh edit from the UI, an agent or the API
    User,
    /// Undo or redo restoring a stored snapshot
    Replay,
}

/// Unique operation ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationID(u64);

impl OperationID {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Everything needed to bring a removed entity back
#[derive(Debug, Clone)]
pub struct EntityRecord {
    /// Entity ID
    pub id: EntityId,
    /// Scene membership record
    pub scene: SceneRecord,
    /// The entity's drawable. A reference to the live object, not a copy.
    pub drawable: DrawableHandle,
    /// Tracks at capture time
    pub tracks: TrackSet,
    /// Live property values at capture time
    pub transform: TransformSnapshot,
}

/// State captured around a mutation
#[derive(Debug, Clone)]
pub enum StateSnapshot {
    /// The entity is not in the scene
    Absent(EntityId),
    /// The entity with its drawable, tracks and scene record
    Entity(EntityRecord),
    /// An entity's tracks, optionally with its raw transform
    Tracks {
        /// Entity ID
        entity: EntityId,
        /// Tracks at capture time
        tracks: TrackSet,
        /// Scene membership record
        scene: SceneRecord,
        /// Live property values, captured for transform edits
        transform: Option<TransformSnapshot>,
    },
    /// Which source masks a target
    Mask {
        /// Masked entity
        target: EntityId,
        /// Mask source, `None` when unmasked
        source: Option<EntityId>,
    },
}

impl StateSnapshot {
    /// Entity the snapshot is about
    pub fn entity(&self) -> EntityId {
        match self {
            StateSnapshot::Absent(id) => *id,
            StateSnapshot::Entity(record) => record.id,
            StateSnapshot::Tracks { entity, .. } => *entity,
            StateSnapshot::Mask { target, .. } => *target,
        }
    }

    /// Keyframes held by the snapshot
    pub fn keyframe_count(&self) -> usize {
        match self {
            StateSnapshot::Entity(record) => record.tracks.keyframe_count(),
            StateSnapshot::Tracks { tracks, .. } => tracks.keyframe_count(),
            StateSnapshot::Absent(_) | StateSnapshot::Mask { .. } => 0,
        }
    }
}

/// An operation that can be undone/redone
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique operation ID
    pub id: OperationID,
    /// Human-readable description
    pub description: String,
    /// State before operation (for undo)
    pub before: StateSnapshot,
    /// State after operation (for redo)
    pub after: StateSnapshot,
    /// Timestamp
    pub timestamp: u64,
}

impl Operation {
    /// Create a new operation
    pub fn new(
        id: OperationID,
        description: String,
        before: StateSnapshot,
        after: StateSnapshot,
    ) -> Self {
        Self {
            id,
            description,
            before,
            after,
            timestamp: unix_seconds(),
        }
    }
}

/// Group of operations that are undone/redone together
#[derive(Debug, Clone)]
pub struct OperationGroup {
    /// Group ID
    pub id: OperationID,
    /// Human-readable description
    pub description: String,
    /// Operations in the order they were applied
    pub operations: Vec<Operation>,
    /// Timestamp
    pub timestamp: u64,
}

impl OperationGroup {
    /// Create a new operation group
    pub fn new(id: OperationID, description: String) -> Self {
        Self {
            id,
            description,
            operations: Vec::new(),
            timestamp: unix_seconds(),
        }
    }

    /// Add an operation to this group
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Get operation count
    pub fn count(&self) -> usize {
        self.operations.len()
    }

    /// Snapshots to restore for undo, in restore order
    pub fn undo_snapshots(&self) -> impl Iterator<Item = &StateSnapshot> {
        self.operations.iter().rev().map(|op| &op.before)
    }

    /// Snapshots to restore for redo, in restore order
    pub fn redo_snapshots(&self) -> impl Iterator<Item = &StateSnapshot> {
        self.operations.iter().map(|op| &op.after)
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Total groups in undo stack
    pub undo_count: usize,
    /// Total groups in redo stack
    pub redo_count: usize,
    /// Keyframes held across all snapshots
    pub keyframes_held: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    /// Undo stack
    undo_stack: VecDeque<OperationGroup>,
    /// Redo stack
    redo_stack: VecDeque<OperationGroup>,
    /// Next operation ID
    next_id: u64,
    /// Maximum history depth
    max_depth: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth: max_depth.max(1),
        }
    }

    /// Allocate an operation ID
    pub fn begin_operation(&mut self) -> OperationID {
        let id = OperationID(self.next_id);
        self.next_id += 1;
        id
    }

    /// Push a group onto the undo stack and clear the redo stack.
    ///
    /// Empty groups are ignored. The oldest group is dropped once the stack
    /// exceeds its depth. Returns false if nothing was recorded.
    pub fn record(&mut self, group: OperationGroup) -> bool {
        if group.operations.is_empty() {
            return false;
        }

        self.redo_stack.clear();
        self.undo_stack.push_back(group);

        while self.undo_stack.len() > self.max_depth {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::debug!("History full, dropped '{}'", evicted.description);
            }
        }
        true
    }

    /// Pop the last group for undo; it moves to the redo stack
    pub fn undo(&mut self) -> Result<OperationGroup> {
        let group = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;

        self.redo_stack.push_back(group.clone());
        Ok(group)
    }

    /// Pop the last undone group for redo; it moves back to the undo stack
    pub fn redo(&mut self) -> Result<OperationGroup> {
        let group = self
            .redo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToRedo)?;

        self.undo_stack.push_back(group.clone());
        Ok(group)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        let keyframes_held = self
            .undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|group| group.operations.iter())
            .map(|op| op.before.keyframe_count() + op.after.keyframe_count())
            .sum();

        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            keyframes_held,
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|g| g.description.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|g| g.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
