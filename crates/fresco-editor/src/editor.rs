//! Editor facade: history, persistence, and recompute in one place.

use std::sync::Arc;

use fresco_pipeline::{ExportSize, PipelineError, RenderResult, ResizeFilter};
use web_time::Instant;

use crate::history::{EditAction, HistoryStore};
use crate::orchestrator::{JobEvent, Orchestrator, OrchestratorConfig};
use crate::persist::PersistencePort;
use crate::snapshot::EditorSnapshot;

/// A photo editing session.
///
/// Every dispatched action is applied to the history, the new present
/// snapshot is saved through the persistence port, and the orchestrator
/// is brought in line with it.
pub struct Editor<P> {
    store: HistoryStore,
    port: P,
    orchestrator: Orchestrator,
    restored: Option<JobEvent>,
}

impl<P: PersistencePort> Editor<P> {
    /// Restore the persisted session, or start empty when nothing is
    /// stored. A restored image is rendered immediately; the outcome is
    /// available from [`restore_event`](Self::restore_event).
    pub fn new(port: P, config: OrchestratorConfig) -> Self {
        let snapshot = port.load().unwrap_or_default();
        let mut orchestrator = Orchestrator::new(config);
        let restored = snapshot.image.as_ref().map(|image| {
            tracing::debug!("restoring persisted image");
            let event =
                orchestrator.load_image(Arc::clone(image.buffer()), snapshot.filter_settings);
            if let JobEvent::Failed { error, .. } = &event {
                tracing::warn!(%error, "restored image could not be rendered");
            }
            event
        });
        Self {
            store: HistoryStore::new(snapshot),
            port,
            orchestrator,
            restored,
        }
    }

    /// Render event of the image restored by [`new`](Self::new), if the
    /// stored session had one.
    #[must_use]
    pub const fn restore_event(&self) -> Option<&JobEvent> {
        self.restored.as_ref()
    }

    /// Apply `action` at time `now`.
    ///
    /// Returns the render event when the action loaded a new image
    /// (which renders synchronously). Filter changes only schedule a
    /// recompute; drive it with [`poll`](Self::poll).
    #[tracing::instrument(skip(self, action, now), fields(action = action.name()))]
    pub fn dispatch(&mut self, action: EditAction, now: Instant) -> Option<JobEvent> {
        let previous = self.store.present().clone();
        self.store.dispatch(action);
        if let Err(e) = self.port.save(self.store.present()) {
            tracing::warn!(error = %e, "failed to persist editor state");
        }
        self.sync(&previous, now)
    }

    fn sync(&mut self, previous: &EditorSnapshot, now: Instant) -> Option<JobEvent> {
        let present = self.store.present();
        match (&previous.image, &present.image) {
            (_, None) if previous.image.is_some() => {
                self.orchestrator.clear_image();
                None
            }
            (_, None) => None,
            (Some(before), Some(after)) if before.same_image(after) => {
                if previous.filter_settings != present.filter_settings {
                    self.orchestrator.request(present.filter_settings, now);
                }
                None
            }
            (_, Some(after)) => Some(
                self.orchestrator
                    .load_image(Arc::clone(after.buffer()), present.filter_settings),
            ),
        }
    }

    /// Run a due recompute on the calling thread.
    pub fn poll(&mut self, now: Instant) -> Option<JobEvent> {
        self.orchestrator.poll(now)
    }

    /// Render the current image and settings at `size`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] when no image is loaded, or
    /// the error of the failing stage.
    pub fn export(
        &self,
        size: ExportSize,
        filter: ResizeFilter,
    ) -> Result<RenderResult, PipelineError> {
        self.orchestrator
            .export(self.store.present().filter_settings, size, filter)
    }

    /// The present snapshot.
    #[must_use]
    pub const fn state(&self) -> &EditorSnapshot {
        self.store.present()
    }

    /// The history store.
    #[must_use]
    pub const fn history(&self) -> &HistoryStore {
        &self.store
    }

    /// The orchestrator, for hosts that display its buffer.
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Mutable orchestrator, for hosts that run jobs on worker threads.
    pub const fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// The persistence port.
    #[must_use]
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Whether an undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    /// Whether a redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }
}
