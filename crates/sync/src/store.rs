//! In-memory highlight set of the active document.

use crate::SyncError;
use highlight_model::{
    ContentPatch, DocumentRef, Highlight, HighlightId, IdGenerator, ModelError, NewHighlight,
    PositionPatch,
};

/// Attempts at drawing an unused id before [`SyncError::IdsExhausted`].
const MAX_ID_ATTEMPTS: usize = 16;

/// Reconciliation state of a locally applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Applied locally, remote write not resolved yet.
    Pending,
    /// Known to the remote store.
    Confirmed,
    /// The remote write failed; the entry only exists locally.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedHighlight {
    highlight: Highlight,
    status: SyncStatus,
    deleting: bool,
    edited: bool,
}

impl TrackedHighlight {
    fn new(highlight: Highlight, status: SyncStatus) -> Self {
        Self { highlight, status, deleting: false, edited: false }
    }

    pub fn highlight(&self) -> &Highlight {
        &self.highlight
    }

    pub fn id(&self) -> &HighlightId {
        self.highlight.id()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// A remote delete was issued and has not resolved yet.
    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// Resized during this session; the remote copy still has the original region.
    pub fn is_edited(&self) -> bool {
        self.edited
    }
}

/// Ordered highlights of exactly one document: new additions first, otherwise
/// in the order of the last reload.
#[derive(Debug, Default)]
pub struct HighlightStore {
    document: Option<DocumentRef>,
    entries: Vec<TrackedHighlight>,
}

impl HighlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&DocumentRef> {
        self.document.as_ref()
    }

    /// Take `highlights` as the confirmed set of `document`.
    ///
    /// Records of other documents, repeated ids and records breaking the
    /// highlight invariants are dropped. When `document` is already the
    /// store's document, local additions the remote store has not confirmed
    /// (pending or failed) are kept in front unless the new set contains them.
    pub fn replace_all(&mut self, document: DocumentRef, highlights: Vec<Highlight>) {
        let mut entries: Vec<TrackedHighlight> = Vec::with_capacity(highlights.len());

        for highlight in highlights {
            if highlight.document() != &document {
                tracing::warn!(id = %highlight.id(), %document, "dropping highlight of another document");
                continue;
            }
            if let Err(err) = highlight.validate() {
                tracing::warn!(id = %highlight.id(), %err, "dropping invalid highlight");
                continue;
            }
            if entries.iter().any(|entry| entry.id() == highlight.id()) {
                tracing::warn!(id = %highlight.id(), "dropping repeated highlight id");
                continue;
            }
            entries.push(TrackedHighlight::new(highlight, SyncStatus::Confirmed));
        }

        if self.document.as_ref() == Some(&document) {
            let unconfirmed: Vec<TrackedHighlight> = std::mem::take(&mut self.entries)
                .into_iter()
                .filter(|entry| entry.status != SyncStatus::Confirmed)
                .filter(|entry| !entries.iter().any(|loaded| loaded.id() == entry.id()))
                .collect();
            entries.splice(0..0, unconfirmed);
        }

        self.document = Some(document);
        self.entries = entries;
    }

    /// Assign a fresh id and prepend the highlight as [`SyncStatus::Pending`].
    pub fn add(
        &mut self,
        selection: NewHighlight,
        ids: &mut dyn IdGenerator,
    ) -> Result<Highlight, SyncError> {
        let document = self.document.clone().ok_or(SyncError::NoActiveDocument)?;
        selection.validate()?;

        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| ids.next_id())
            .find(|id| !self.contains(id))
            .ok_or(SyncError::IdsExhausted)?;

        let highlight = Highlight::new(id, document, selection)?;
        self.entries.insert(0, TrackedHighlight::new(highlight.clone(), SyncStatus::Pending));
        Ok(highlight)
    }

    /// Merge a resize into the matching highlight. `Ok(false)` when the id is unknown.
    pub fn update(
        &mut self,
        id: &HighlightId,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> Result<bool, ModelError> {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.id() == id) else {
            return Ok(false);
        };

        entry.highlight.apply_patch(position, content)?;
        entry.edited = true;
        Ok(true)
    }

    pub fn remove(&mut self, id: &HighlightId) -> Option<Highlight> {
        let index = self.entries.iter().position(|entry| entry.id() == id)?;
        Some(self.entries.remove(index).highlight)
    }

    /// Drop every local highlight. The remote store is not touched.
    pub fn reset_all(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn set_status(&mut self, id: &HighlightId, status: SyncStatus) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id() == id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn set_deleting(&mut self, id: &HighlightId, deleting: bool) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id() == id) {
            Some(entry) => {
                entry.deleting = deleting;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &HighlightId) -> Option<&TrackedHighlight> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn highlight(&self, id: &HighlightId) -> Option<&Highlight> {
        self.get(id).map(TrackedHighlight::highlight)
    }

    pub fn contains(&self, id: &HighlightId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedHighlight> {
        self.entries.iter()
    }

    pub fn highlights(&self) -> impl Iterator<Item = &Highlight> {
        self.entries.iter().map(TrackedHighlight::highlight)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
