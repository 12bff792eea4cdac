//! The viewer-facing controller tying store, navigation and switcher together.

use crate::dispatch::{Completion, Dispatcher, RemoteCall};
use crate::navigation::{NavigationController, ScrollRegistration, ScrollTarget};
use crate::store::{HighlightStore, SyncStatus};
use crate::switcher::DocumentSwitcher;
use crate::SyncError;
use highlight_model::{
    ContentPatch, DocumentRef, HighlightId, IdGenerator, NewHighlight, PositionPatch, RandomIds,
};
use std::time::{Duration, Instant};

/// Highlight state of one viewer.
///
/// Additions are shown immediately and persisted in the background; a failed
/// create is not rolled back, the entry just ends up [`SyncStatus::Failed`].
/// Deletions go the other way round: the entry stays until the remote store
/// confirms. Resize edits stay in this session (see [`Self::update_highlight`]).
pub struct HighlightSession {
    store: HighlightStore,
    navigation: NavigationController,
    switcher: DocumentSwitcher,
    dispatcher: Dispatcher,
    ids: Box<dyn IdGenerator>,
}

impl HighlightSession {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            store: HighlightStore::new(),
            navigation: NavigationController::new(),
            switcher: DocumentSwitcher::new(),
            dispatcher,
            ids: Box::new(RandomIds),
        }
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn store(&self) -> &HighlightStore {
        &self.store
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    pub fn active_document(&self) -> Option<&DocumentRef> {
        self.switcher.active()
    }

    /// Remote calls whose completion has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Switch documents. The previous set is dropped right away and the new
    /// one shows up once its reload completes.
    pub fn set_active_document(&mut self, document: DocumentRef) {
        tracing::info!(%document, "activating document");
        let ticket = self.switcher.begin(document.clone());

        self.navigation.clear();
        self.store.replace_all(document, Vec::new());
        self.dispatcher.submit(RemoteCall::List(ticket));
    }

    pub fn add_highlight(&mut self, selection: NewHighlight) -> Result<HighlightId, SyncError> {
        let highlight = self.store.add(selection, self.ids.as_mut())?;
        let id = highlight.id().clone();

        tracing::debug!(%id, "highlight added locally");
        self.dispatcher.submit(RemoteCall::Create(highlight));
        Ok(id)
    }

    /// Apply a resize to an area highlight.
    ///
    /// The remote contract has no update call, so the edit is kept for this
    /// session only and the entry is flagged as edited.
    pub fn update_highlight(
        &mut self,
        id: &HighlightId,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> Result<bool, SyncError> {
        Ok(self.store.update(id, position, content)?)
    }

    /// Ask the remote store to delete `id`; the local entry goes once that is confirmed.
    ///
    /// Returns `false` for unknown ids and for deletes already under way.
    pub fn delete_highlight(&mut self, id: &HighlightId) -> bool {
        match self.store.get(id) {
            Some(entry) if !entry.is_deleting() => {}
            _ => return false,
        }

        self.store.set_deleting(id, true);
        self.dispatcher.submit(RemoteCall::Delete(id.clone()));
        true
    }

    /// Clear the local view and the navigation target. Remote records are kept.
    pub fn reset_all(&mut self) -> usize {
        self.navigation.clear();
        self.store.reset_all()
    }

    /// Navigate to a highlight picked from a list.
    pub fn navigate_to(&mut self, id: HighlightId) -> bool {
        self.navigation.set_target(id);
        self.navigation.resolve_and_scroll(&self.store)
    }

    /// The address fragment changed outside the session (shared link, history navigation).
    pub fn on_fragment_changed(&mut self, fragment: &str) -> bool {
        self.navigation.apply_fragment(fragment);
        self.navigation.resolve_and_scroll(&self.store)
    }

    /// A scroll the user made themselves drops the navigation target.
    pub fn on_user_scroll(&mut self) {
        self.navigation.clear();
    }

    pub fn fragment(&self) -> String {
        self.navigation.fragment()
    }

    /// Bind the mounted viewer's scroll capability and resolve any pending target against it.
    pub fn register_scroll(&mut self, target: impl ScrollTarget + 'static) -> ScrollRegistration {
        let registration = self.navigation.register_scroll(Box::new(target));
        self.navigation.resolve_and_scroll(&self.store);
        registration
    }

    pub fn unregister_scroll(&mut self, registration: ScrollRegistration) -> bool {
        self.navigation.unregister_scroll(registration)
    }

    /// Apply every completion that has arrived; returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.dispatcher.try_next() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block until every in-flight call has completed or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.dispatcher.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }

            match self.dispatcher.next_timeout(remaining) {
                Some(completion) => self.apply(completion),
                None => return false,
            }
        }

        true
    }

    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Listed { ticket, result } => {
                if !self.switcher.accept(&ticket) {
                    tracing::debug!(
                        document = %ticket.document(),
                        generation = ticket.generation(),
                        "discarding stale reload"
                    );
                    return;
                }

                match result {
                    Ok(highlights) => {
                        tracing::debug!(document = %ticket.document(), count = highlights.len(), "highlights loaded");
                        self.store.replace_all(ticket.document().clone(), highlights);
                        self.navigation.resolve_and_scroll(&self.store);
                    }
                    Err(err) => {
                        tracing::warn!(document = %ticket.document(), %err, "failed to load highlights");
                    }
                }
            }
            Completion::Created { id, result } => {
                let status = match result {
                    Ok(()) => SyncStatus::Confirmed,
                    Err(err) => {
                        tracing::warn!(%id, %err, "failed to save highlight; keeping local copy");
                        SyncStatus::Failed
                    }
                };

                if !self.store.set_status(&id, status) {
                    tracing::debug!(%id, "create resolved for highlight no longer shown");
                }
            }
            Completion::Deleted { id, result } => match result {
                Ok(true) => {
                    self.store.remove(&id);
                }
                Ok(false) => {
                    tracing::warn!(%id, "remote store did not confirm delete");
                    self.store.set_deleting(&id, false);
                }
                Err(err) => {
                    tracing::warn!(%id, %err, "failed to delete highlight");
                    self.store.set_deleting(&id, false);
                }
            },
        }
    }
}

impl std::fmt::Debug for HighlightSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightSession")
            .field("store", &self.store)
            .field("navigation", &self.navigation)
            .field("switcher", &self.switcher)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
