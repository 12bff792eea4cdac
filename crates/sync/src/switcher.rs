//! Active document selection with fencing of stale reloads.

use highlight_model::DocumentRef;

/// Identifies one reload request; carried through the gateway call and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    document: DocumentRef,
    generation: u64,
}

impl LoadTicket {
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// There is no way to cancel an in-flight reload, so a response is checked
/// against the switcher's state when it arrives instead.
#[derive(Debug, Default)]
pub struct DocumentSwitcher {
    active: Option<DocumentRef>,
    generation: u64,
    applied: u64,
}

impl DocumentSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&DocumentRef> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Make `document` active and issue the ticket for its reload.
    pub fn begin(&mut self, document: DocumentRef) -> LoadTicket {
        self.generation += 1;
        self.active = Some(document.clone());
        LoadTicket { document, generation: self.generation }
    }

    /// Whether a resolved reload may replace the store.
    ///
    /// The ticket must name the active document and be newer than the last
    /// reload applied, so an older response for the same document cannot
    /// overwrite a newer one.
    pub fn accept(&mut self, ticket: &LoadTicket) -> bool {
        if self.active.as_ref() != Some(&ticket.document) || ticket.generation <= self.applied {
            return false;
        }

        self.applied = ticket.generation;
        true
    }
}
