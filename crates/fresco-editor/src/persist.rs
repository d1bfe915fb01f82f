//! Snapshot persistence.
//!
//! The editor never touches storage directly; it talks to a
//! [`PersistencePort`]. Two adapters are provided: [`CallbackPort`] for
//! hosts that already own a storage API, and [`KeyValuePort`] for flat
//! string stores such as browser `localStorage`.

use std::collections::HashMap;

use crate::snapshot::EditorSnapshot;

/// Key the snapshot is stored under in a [`KeyValueStore`].
pub const STORAGE_KEY: &str = "editorState";

/// Errors raised while saving a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing store rejected the write.
    #[error("storage rejected write: {0}")]
    Storage(String),
}

/// Where the editor keeps its present snapshot between sessions.
pub trait PersistencePort {
    /// Store `snapshot`, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the snapshot cannot be encoded or
    /// written.
    fn save(&mut self, snapshot: &EditorSnapshot) -> Result<(), PersistError>;

    /// The stored snapshot, or `None` when nothing usable is stored.
    fn load(&self) -> Option<EditorSnapshot>;
}

/// Adapts a pair of closures to [`PersistencePort`].
pub struct CallbackPort<S, L> {
    save: S,
    load: L,
}

impl<S, L> CallbackPort<S, L>
where
    S: FnMut(&EditorSnapshot) -> Result<(), PersistError>,
    L: Fn() -> Option<EditorSnapshot>,
{
    /// Wrap `save` and `load`.
    pub const fn new(save: S, load: L) -> Self {
        Self { save, load }
    }
}

impl<S, L> PersistencePort for CallbackPort<S, L>
where
    S: FnMut(&EditorSnapshot) -> Result<(), PersistError>,
    L: Fn() -> Option<EditorSnapshot>,
{
    fn save(&mut self, snapshot: &EditorSnapshot) -> Result<(), PersistError> {
        (self.save)(snapshot)
    }

    fn load(&self) -> Option<EditorSnapshot> {
        (self.load)()
    }
}

/// A flat string key-value store.
pub trait KeyValueStore {
    /// Value under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Storage`] when the store refuses the write
    /// (quota exceeded, read-only, ...).
    fn set(&mut self, key: &str, value: String) -> Result<(), PersistError>;
}

/// In-process [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Stores the snapshot as JSON under [`STORAGE_KEY`].
#[derive(Debug, Clone, Default)]
pub struct KeyValuePort<S> {
    store: S,
}

impl<S: KeyValueStore> KeyValuePort<S> {
    /// Persist into `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backing store.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: KeyValueStore> PersistencePort for KeyValuePort<S> {
    fn save(&mut self, snapshot: &EditorSnapshot) -> Result<(), PersistError> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(STORAGE_KEY, json)
    }

    fn load(&self) -> Option<EditorSnapshot> {
        let json = self.store.get(STORAGE_KEY)?;
        match serde_json::from_str(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable editor state");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use fresco_pipeline::{ArtStyle, FilterSettings};

    use super::*;

    #[test]
    fn key_value_port_round_trips() {
        let mut port = KeyValuePort::new(MemoryStore::new());
        assert!(port.load().is_none());

        let snapshot = EditorSnapshot {
            filter_settings: FilterSettings {
                contrast: -20,
                art_style: ArtStyle::SegmentedCollage,
                ..FilterSettings::default()
            },
            ..EditorSnapshot::default()
        };
        port.save(&snapshot).unwrap();
        assert!(port.store().get(STORAGE_KEY).unwrap().contains("segmented-collage"));
        assert_eq!(port.load(), Some(snapshot));
    }

    #[test]
    fn malformed_state_loads_as_none() {
        let mut port = KeyValuePort::new(MemoryStore::new());
        port.store_mut()
            .set(STORAGE_KEY, "{not json".to_string())
            .unwrap();
        assert!(port.load().is_none());
    }

    #[test]
    fn partial_state_fills_defaults_and_clamps() {
        let mut port = KeyValuePort::new(MemoryStore::new());
        port.store_mut()
            .set(
                STORAGE_KEY,
                r#"{"filterSettings":{"saturation":-400,"rasterGranularity":150}}"#.to_string(),
            )
            .unwrap();
        let snapshot = port.load().unwrap();
        assert_eq!(snapshot.filter_settings.saturation, -100);
        assert_eq!(snapshot.filter_settings.raster_granularity, 100);
        assert_eq!(
            snapshot.filter_settings.art_randomness,
            FilterSettings::DEFAULT_RANDOMNESS
        );
        assert_eq!(snapshot.metadata, crate::snapshot::ImageMetadata::default());
    }

    #[test]
    fn callback_port_forwards() {
        let saved = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&saved);
        let mut port = CallbackPort::new(
            move |snapshot: &EditorSnapshot| {
                sink.borrow_mut().push(snapshot.clone());
                Ok(())
            },
            || Some(EditorSnapshot::default()),
        );
        port.save(&EditorSnapshot::default()).unwrap();
        assert_eq!(saved.borrow().len(), 1);
        assert_eq!(port.load(), Some(EditorSnapshot::default()));
    }

    #[test]
    fn storage_failures_surface() {
        let mut port = CallbackPort::new(
            |_: &EditorSnapshot| Err(PersistError::Storage("quota exceeded".to_string())),
            || None,
        );
        let err = port.save(&EditorSnapshot::default()).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
