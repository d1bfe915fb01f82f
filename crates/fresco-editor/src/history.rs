//! Bounded undo/redo history.

use std::collections::VecDeque;

use fresco_pipeline::FilterSettings;

use crate::snapshot::{
    CropSettings, EditorSnapshot, FilterPatch, ImageHandle, ImageMetadata, MetadataPatch,
    RotationSettings,
};

/// Number of undo steps kept. Older entries are dropped first.
pub const MAX_HISTORY_LENGTH: usize = 50;

/// Linear edit history: `past`, the `present` value, and `future`.
///
/// `past` is ordered oldest first; `future` is ordered next-to-redo
/// first.
#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,
}

impl<T: Default> Default for History<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> History<T> {
    /// Start a history at `present` with nothing to undo or redo.
    #[must_use]
    pub const fn new(present: T) -> Self {
        Self {
            past: VecDeque::new(),
            present,
            future: VecDeque::new(),
        }
    }

    /// Record `next` as the new present. Clears the redo stack.
    pub fn edit(&mut self, next: T) {
        let previous = std::mem::replace(&mut self.present, next);
        self.past.push_back(previous);
        while self.past.len() > MAX_HISTORY_LENGTH {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// Step back one edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        true
    }

    /// Step forward one edit. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        true
    }

    /// Whether [`undo`](Self::undo) would change anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether [`redo`](Self::redo) would change anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// The current value.
    #[must_use]
    pub const fn present(&self) -> &T {
        &self.present
    }

    /// Undo entries, oldest first.
    #[must_use]
    pub const fn past(&self) -> &VecDeque<T> {
        &self.past
    }

    /// Redo entries, next first.
    #[must_use]
    pub const fn future(&self) -> &VecDeque<T> {
        &self.future
    }
}

/// Every change the editor accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    /// Replace or clear the image. Clearing also resets filters and
    /// metadata.
    SetImage(Option<ImageHandle>),
    /// Partial filter update.
    UpdateFilter(FilterPatch),
    /// Partial metadata update.
    UpdateMetadata(MetadataPatch),
    /// Replace the crop rectangle.
    UpdateCrop(CropSettings),
    /// Replace the rotation.
    UpdateRotation(RotationSettings),
    /// Restore every filter setting to its default.
    ResetFilters,
    /// Step back.
    Undo,
    /// Step forward.
    Redo,
}

impl EditAction {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetImage(_) => "set-image",
            Self::UpdateFilter(_) => "update-filter",
            Self::UpdateMetadata(_) => "update-metadata",
            Self::UpdateCrop(_) => "update-crop",
            Self::UpdateRotation(_) => "update-rotation",
            Self::ResetFilters => "reset-filters",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

/// Editor snapshots under undo/redo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStore {
    history: History<EditorSnapshot>,
}

impl HistoryStore {
    /// Start from `present` with empty undo and redo stacks.
    #[must_use]
    pub const fn new(present: EditorSnapshot) -> Self {
        Self {
            history: History::new(present),
        }
    }

    /// Apply `action`. Every variant other than `Undo`/`Redo` records a
    /// new history entry, even when the resulting snapshot is unchanged.
    pub fn dispatch(&mut self, action: EditAction) {
        let present = self.history.present();
        let next = match action {
            EditAction::Undo => {
                self.history.undo();
                return;
            }
            EditAction::Redo => {
                self.history.redo();
                return;
            }
            EditAction::SetImage(Some(image)) => EditorSnapshot {
                image: Some(image),
                ..present.clone()
            },
            EditAction::SetImage(None) => EditorSnapshot {
                image: None,
                filter_settings: FilterSettings::default(),
                metadata: ImageMetadata::default(),
                ..present.clone()
            },
            EditAction::UpdateFilter(patch) => EditorSnapshot {
                filter_settings: patch.apply(present.filter_settings),
                ..present.clone()
            },
            EditAction::UpdateMetadata(patch) => {
                let mut next = present.clone();
                next.metadata = patch.apply(next.metadata);
                next
            }
            EditAction::UpdateCrop(crop_settings) => EditorSnapshot {
                crop_settings,
                ..present.clone()
            },
            EditAction::UpdateRotation(rotation_settings) => EditorSnapshot {
                rotation_settings,
                ..present.clone()
            },
            EditAction::ResetFilters => EditorSnapshot {
                filter_settings: FilterSettings::default(),
                ..present.clone()
            },
        };
        self.history.edit(next);
    }

    /// The current snapshot.
    #[must_use]
    pub const fn present(&self) -> &EditorSnapshot {
        self.history.present()
    }

    /// Underlying history.
    #[must_use]
    pub const fn history(&self) -> &History<EditorSnapshot> {
        &self.history
    }

    /// Whether an undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether a redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fresco_pipeline::{ArtStyle, PixelBuffer};

    use super::*;
    use crate::snapshot::{CropMode, RotationMode};

    #[test]
    fn undo_walks_back_through_every_edit() {
        let mut history = History::new(0);
        for n in 1..=5 {
            history.edit(n);
        }
        for expected in (0..5).rev() {
            assert!(history.undo());
            assert_eq!(*history.present(), expected);
        }
        assert!(!history.undo());
        assert_eq!(*history.present(), 0);
        assert_eq!(history.future().len(), 5);
    }

    #[test]
    fn past_is_capped_oldest_first() {
        let mut history = History::new(0);
        for n in 1..=60 {
            history.edit(n);
        }
        assert_eq!(history.past().len(), MAX_HISTORY_LENGTH);
        assert_eq!(history.past().front(), Some(&10));
        assert_eq!(history.past().back(), Some(&59));
    }

    #[test]
    fn redo_restores_and_edit_clears_future() {
        let mut history = History::new("a");
        history.edit("b");
        history.edit("c");
        history.undo();
        history.undo();
        assert!(history.redo());
        assert_eq!(*history.present(), "b");
        assert!(history.can_redo());

        history.edit("x");
        assert!(!history.can_redo());
        assert!(!history.redo());
        assert_eq!(history.past().iter().copied().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut history = History::new(1);
        history.edit(2);
        let before = history.clone();
        history.undo();
        history.redo();
        assert_eq!(history, before);
    }

    fn stipple() -> EditAction {
        EditAction::UpdateFilter(FilterPatch {
            art_style: Some(ArtStyle::Stipple),
            ..FilterPatch::default()
        })
    }

    #[test]
    fn reset_filters_is_its_own_edit() {
        let mut store = HistoryStore::default();
        store.dispatch(stipple());
        store.dispatch(EditAction::ResetFilters);
        assert_eq!(store.present().filter_settings, FilterSettings::default());
        assert_eq!(store.history().past().len(), 2);

        store.dispatch(EditAction::Undo);
        assert_eq!(store.present().filter_settings.art_style, ArtStyle::Stipple);
    }

    #[test]
    fn clearing_the_image_resets_filters_and_metadata() {
        let mut store = HistoryStore::default();
        store.dispatch(EditAction::SetImage(Some(ImageHandle::new(
            PixelBuffer::filled(2, 2, [0, 0, 0, 255]),
        ))));
        store.dispatch(stipple());
        store.dispatch(EditAction::UpdateMetadata(MetadataPatch {
            title: Some("Harbor".to_string()),
            ..MetadataPatch::default()
        }));
        store.dispatch(EditAction::UpdateCrop(CropSettings::for_mode(CropMode::Square)));

        store.dispatch(EditAction::SetImage(None));
        let present = store.present();
        assert!(present.image.is_none());
        assert_eq!(present.filter_settings, FilterSettings::default());
        assert_eq!(present.metadata, ImageMetadata::default());
        assert_eq!(present.crop_settings.mode, CropMode::Square);
        assert_eq!(store.history().past().len(), 5);
    }

    #[test]
    fn setting_an_image_keeps_other_fields() {
        let mut store = HistoryStore::default();
        store.dispatch(stipple());
        store.dispatch(EditAction::SetImage(Some(ImageHandle::new(
            PixelBuffer::filled(1, 1, [1, 1, 1, 255]),
        ))));
        assert_eq!(store.present().filter_settings.art_style, ArtStyle::Stipple);
        assert!(store.present().image.is_some());
    }

    #[test]
    fn rotation_edits_record_history() {
        let mut store = HistoryStore::default();
        store.dispatch(EditAction::UpdateRotation(RotationSettings::new(
            RotationMode::Quarter,
            0.0,
        )));
        assert!(store.can_undo());
        assert!(!store.can_redo());
        store.dispatch(EditAction::Undo);
        assert_eq!(store.present().rotation_settings, RotationSettings::default());
        assert!(store.can_redo());
    }

    #[test]
    fn undo_on_fresh_store_is_a_no_op() {
        let mut store = HistoryStore::default();
        store.dispatch(EditAction::Undo);
        store.dispatch(EditAction::Redo);
        assert_eq!(*store.present(), EditorSnapshot::default());
    }
}
