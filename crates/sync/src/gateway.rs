//! The boundary to the remote highlight store.

use highlight_model::{DocumentRef, Highlight, HighlightId};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The remote store refused the request as malformed (HTTP 4xx).
    #[error("validation error: {0}")]
    Validation(String),
    #[error("highlight {0} already exists")]
    Duplicate(HighlightId),
    /// Network failure, unreachable server or a 5xx response.
    #[error("transport error: {0}")]
    Transport(String),
}

/// One request/response exchange per call; implementations never cache and never retry.
pub trait HighlightGateway {
    /// File names of the documents the remote store serves.
    fn list_documents(&self) -> Result<Vec<String>, GatewayError>;

    /// Every stored highlight of `document`; empty when none were saved yet.
    fn list_for_document(&self, document: &DocumentRef) -> Result<Vec<Highlight>, GatewayError>;

    /// Persist a new highlight. A duplicate id fails instead of overwriting.
    fn create(&self, highlight: &Highlight) -> Result<(), GatewayError>;

    /// Remove a highlight; `Ok(true)` is the remote store's success flag.
    fn delete(&self, id: &HighlightId) -> Result<bool, GatewayError>;
}

/// Gateway backed by process memory, with the same uniqueness rule as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: Vec<String>,
    highlights: Vec<Highlight>,
    offline: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gateway = Self::default();
        gateway.lock().documents = documents.into_iter().map(Into::into).collect();
        gateway
    }

    /// Seed a stored highlight, bypassing the duplicate check.
    pub fn seed(&self, highlight: Highlight) {
        self.lock().highlights.push(highlight);
    }

    /// While offline every call fails with [`GatewayError::Transport`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn stored(&self) -> Vec<Highlight> {
        self.lock().highlights.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, GatewayError> {
        let state = self.lock();
        if state.offline {
            return Err(GatewayError::Transport("remote store unreachable".to_owned()));
        }
        Ok(state)
    }
}

impl HighlightGateway for MemoryGateway {
    fn list_documents(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.online()?.documents.clone())
    }

    fn list_for_document(&self, document: &DocumentRef) -> Result<Vec<Highlight>, GatewayError> {
        let state = self.online()?;
        Ok(state.highlights.iter().filter(|h| h.document() == document).cloned().collect())
    }

    fn create(&self, highlight: &Highlight) -> Result<(), GatewayError> {
        let mut state = self.online()?;
        if state.highlights.iter().any(|h| h.id() == highlight.id()) {
            return Err(GatewayError::Duplicate(highlight.id().clone()));
        }

        state.highlights.push(highlight.clone());
        Ok(())
    }

    fn delete(&self, id: &HighlightId) -> Result<bool, GatewayError> {
        let mut state = self.online()?;
        state.highlights.retain(|h| h.id() != id);
        Ok(true)
    }
}

impl<G: HighlightGateway + ?Sized> HighlightGateway for std::sync::Arc<G> {
    fn list_documents(&self) -> Result<Vec<String>, GatewayError> {
        (**self).list_documents()
    }

    fn list_for_document(&self, document: &DocumentRef) -> Result<Vec<Highlight>, GatewayError> {
        (**self).list_for_document(document)
    }

    fn create(&self, highlight: &Highlight) -> Result<(), GatewayError> {
        (**self).create(highlight)
    }

    fn delete(&self, id: &HighlightId) -> Result<bool, GatewayError> {
        (**self).delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_model::{Comment, Content, NewHighlight, Position, ScaledRect};

    fn highlight(id: &str, document: &str) -> Highlight {
        let rect = ScaledRect { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0, width: 1.0, height: 1.0 };
        Highlight::new(
            HighlightId::new(id),
            DocumentRef::new(document),
            NewHighlight {
                position: Position { bounding_rect: rect, rects: Vec::new(), page_number: 1 },
                content: Content::text("abc"),
                comment: Comment::default(),
            },
        )
        .expect("highlight should be valid")
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let gateway = MemoryGateway::new();
        gateway.create(&highlight("h1", "doc1")).expect("first create should succeed");

        let err = gateway.create(&highlight("h1", "doc2")).expect_err("duplicate should fail");
        assert_eq!(err, GatewayError::Duplicate(HighlightId::new("h1")));
        assert_eq!(gateway.stored().len(), 1);
    }

    #[test]
    fn delete_of_unknown_id_succeeds() {
        let gateway = MemoryGateway::new();
        assert_eq!(gateway.delete(&HighlightId::new("missing")), Ok(true));
    }

    #[test]
    fn offline_gateway_reports_transport_errors() {
        let gateway = MemoryGateway::with_documents(["a.pdf"]);
        gateway.set_offline(true);

        assert!(matches!(gateway.list_documents(), Err(GatewayError::Transport(_))));

        gateway.set_offline(false);
        assert_eq!(gateway.list_documents(), Ok(vec!["a.pdf".to_owned()]));
    }
}
