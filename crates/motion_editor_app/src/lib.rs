// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion Editor engine.
//!
//! Editor-side layer over [`motion_editor_sequencer`]:
//! - Engine configuration loaded from RON
//! - Scene membership, selection and playback in one editor state
//! - Commands for every scene mutation
//! - Snapshot-based undo/redo with replay suppression
//!
//! ## Architecture
//!
//! Every mutation is an [`EditorCommand`] run through [`EditorState::apply`].
//! User mutations are captured and recorded in the [`History`]; undo and redo
//! replay stored snapshots through the same entry point without recording.

pub mod commands;
pub mod config;
pub mod history;
pub mod state;

pub use commands::{
    AddEntityCommand, CaptureScope, CommandError, EditorCommand, KeyframeCommand, KeyframeEdit,
    MaskCommand, RemoveEntityCommand, RestoreCommand, TransformCommand,
};
pub use config::{ConfigError, EngineConfig};
pub use history::{
    EntityRecord, History, HistoryError, HistoryStats, MutationOrigin, Operation, OperationGroup,
    OperationID, StateSnapshot, MAX_HISTORY,
};
pub use state::{EditorState, PendingTransform, SceneData, SceneRecord, Selection};
