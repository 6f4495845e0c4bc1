//! Reference store seam and refresh bracketing.
//!
//! File, photo, and peer handles embedded in a serialized message can go
//! stale. The external reference store re-resolves them during
//! serialization when refresh mode is on; [`RefreshGuard`] brackets a
//! serialization so the mode is always switched back off, even when
//! serialization fails.

/// External store tracking potentially stale media/file handles.
pub trait ReferenceStore {
    /// Toggle refresh-on-next-serialization mode.
    fn refresh_next(&self, enable: bool);
}

/// RAII bracket around a reference-refreshing serialization.
///
/// Enables refresh mode on construction and disables it on drop.
pub struct RefreshGuard<'a> {
    store: &'a dyn ReferenceStore,
}

impl<'a> RefreshGuard<'a> {
    /// Begin a refresh bracket on `store`.
    pub fn begin(store: &'a dyn ReferenceStore) -> Self {
        store.refresh_next(true);
        Self { store }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.store.refresh_next(false);
    }
}
