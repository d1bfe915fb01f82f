//! fresco-editor: stateful side of the fresco photo editor.
//!
//! Wraps the pure [`fresco_pipeline`] in the pieces an interactive host
//! needs:
//!
//! - [`history`]: bounded undo/redo over [`EditorSnapshot`]s.
//! - [`persist`]: a port for saving and restoring the present snapshot.
//! - [`orchestrator`]: debounced recompute with generation-based
//!   cancellation.
//! - [`editor`]: the facade that keeps the three in step.
//!
//! Nothing here reads the clock or spawns threads on its own; hosts pass
//! `now` in and decide where [`RecomputeJob`]s run.

pub mod editor;
pub mod history;
pub mod orchestrator;
pub mod persist;
pub mod snapshot;

pub use editor::Editor;
pub use history::{EditAction, History, HistoryStore, MAX_HISTORY_LENGTH};
pub use orchestrator::{JobEvent, JobOutput, Orchestrator, OrchestratorConfig, RecomputeJob};
pub use persist::{
    CallbackPort, KeyValuePort, KeyValueStore, MemoryStore, PersistError, PersistencePort,
    STORAGE_KEY,
};
pub use snapshot::{
    CropMode, CropSettings, EditorSnapshot, FilterPatch, ImageHandle, ImageMetadata,
    MetadataPatch, RotationMode, RotationSettings,
};
