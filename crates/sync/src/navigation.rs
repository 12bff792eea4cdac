//! Navigation by highlight id.
//!
//! The navigation target is plain state held by [`NavigationController`]. The
//! `#highlight-<id>` address fragment is only its shareable encoding: the
//! embedder feeds external fragment changes in with
//! [`NavigationController::apply_fragment`] and reads the current encoding back
//! with [`NavigationController::fragment`].

use crate::store::HighlightStore;
use highlight_model::{Highlight, HighlightId};
use std::fmt;

pub const FRAGMENT_PREFIX: &str = "highlight-";

/// Target encoded by an address fragment, with or without the leading `#`.
///
/// The empty fragment, or any fragment not of the form `#highlight-<id>`, has no target.
pub fn parse_fragment(fragment: &str) -> Option<HighlightId> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let id = fragment.strip_prefix(FRAGMENT_PREFIX)?;

    (!id.is_empty()).then(|| HighlightId::new(id))
}

pub fn fragment_for(id: &HighlightId) -> String {
    format!("#{FRAGMENT_PREFIX}{id}")
}

/// Viewer capability that brings a highlight into view.
pub trait ScrollTarget {
    fn scroll_to(&mut self, highlight: &Highlight);
}

impl<F> ScrollTarget for F
where
    F: FnMut(&Highlight),
{
    fn scroll_to(&mut self, highlight: &Highlight) {
        self(highlight)
    }
}

/// Handle returned by [`ScrollRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegistration(u64);

/// Holds the scroll capability of the currently mounted viewer.
///
/// Registering replaces the previous capability in one step. Unregistering with
/// a stale handle (an older viewer unmounting late) leaves the current one bound.
#[derive(Default)]
pub struct ScrollRegistry {
    current: Option<(ScrollRegistration, Box<dyn ScrollTarget>)>,
    issued: u64,
}

impl ScrollRegistry {
    pub fn register(&mut self, target: Box<dyn ScrollTarget>) -> ScrollRegistration {
        self.issued += 1;
        let registration = ScrollRegistration(self.issued);
        self.current = Some((registration, target));
        registration
    }

    pub fn unregister(&mut self, registration: ScrollRegistration) -> bool {
        match &self.current {
            Some((current, _)) if *current == registration => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.current.is_some()
    }

    /// Returns `false` when no viewer is registered.
    pub fn scroll_to(&mut self, highlight: &Highlight) -> bool {
        match &mut self.current {
            Some((_, target)) => {
                target.scroll_to(highlight);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ScrollRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollRegistry")
            .field("current", &self.current.as_ref().map(|(registration, _)| registration))
            .field("issued", &self.issued)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct NavigationController {
    target: Option<HighlightId>,
    scroll: ScrollRegistry,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_target_id(&self) -> Option<&HighlightId> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, id: HighlightId) {
        self.target = Some(id);
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Take the target from an externally changed fragment (e.g. an opened shared link).
    pub fn apply_fragment(&mut self, fragment: &str) {
        self.target = parse_fragment(fragment);
    }

    /// The shareable encoding of the current target; empty when there is none.
    pub fn fragment(&self) -> String {
        self.target.as_ref().map(fragment_for).unwrap_or_default()
    }

    pub fn register_scroll(&mut self, target: Box<dyn ScrollTarget>) -> ScrollRegistration {
        self.scroll.register(target)
    }

    pub fn unregister_scroll(&mut self, registration: ScrollRegistration) -> bool {
        self.scroll.unregister(registration)
    }

    pub fn has_scroll_target(&self) -> bool {
        self.scroll.is_bound()
    }

    /// Scroll to the target if `store` holds it. Unknown or stale targets are ignored.
    pub fn resolve_and_scroll(&mut self, store: &HighlightStore) -> bool {
        let Some(id) = &self.target else {
            return false;
        };

        match store.highlight(id) {
            Some(highlight) => self.scroll.scroll_to(highlight),
            None => {
                tracing::debug!(%id, "navigation target not loaded");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_model::{
        Comment, Content, DocumentRef, NewHighlight, Position, ScaledRect,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store_with(ids: &[&str]) -> HighlightStore {
        let rect = ScaledRect { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0, width: 1.0, height: 1.0 };
        let highlights = ids
            .iter()
            .map(|id| {
                Highlight::new(
                    HighlightId::new(*id),
                    DocumentRef::new("doc1"),
                    NewHighlight {
                        position: Position { bounding_rect: rect, rects: Vec::new(), page_number: 1 },
                        content: Content::text("abc"),
                        comment: Comment::default(),
                    },
                )
                .expect("highlight should be valid")
            })
            .collect();

        let mut store = HighlightStore::new();
        store.replace_all(DocumentRef::new("doc1"), highlights);
        store
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, Box<dyn ScrollTarget>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let target = move |highlight: &Highlight| sink.borrow_mut().push(highlight.id().to_string());
        (seen, Box::new(target))
    }

    #[test]
    fn fragment_codec() {
        assert_eq!(parse_fragment("#highlight-abc"), Some(HighlightId::new("abc")));
        assert_eq!(parse_fragment("highlight-abc"), Some(HighlightId::new("abc")));
        assert_eq!(parse_fragment(""), None);
        assert_eq!(parse_fragment("#"), None);
        assert_eq!(parse_fragment("#highlight-"), None);
        assert_eq!(parse_fragment("#page=2"), None);
        assert_eq!(fragment_for(&HighlightId::new("abc")), "#highlight-abc");
    }

    #[test]
    fn fragment_reflects_target() {
        let mut navigation = NavigationController::new();
        assert_eq!(navigation.fragment(), "");

        navigation.set_target(HighlightId::new("x"));
        assert_eq!(navigation.fragment(), "#highlight-x");

        navigation.clear();
        assert_eq!(navigation.current_target_id(), None);
        assert_eq!(navigation.fragment(), "");
    }

    #[test]
    fn resolve_scrolls_to_known_target() {
        let store = store_with(&["a", "b"]);
        let (seen, target) = recorder();

        let mut navigation = NavigationController::new();
        navigation.register_scroll(target);
        navigation.apply_fragment("#highlight-b");

        assert!(navigation.resolve_and_scroll(&store));
        assert_eq!(*seen.borrow(), vec!["b".to_owned()]);
    }

    #[test]
    fn unknown_target_is_ignored() {
        let store = store_with(&["a"]);
        let (seen, target) = recorder();

        let mut navigation = NavigationController::new();
        navigation.register_scroll(target);
        navigation.apply_fragment("#highlight-zzz");

        assert!(!navigation.resolve_and_scroll(&store));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn resolve_without_viewer_does_nothing() {
        let store = store_with(&["a"]);
        let mut navigation = NavigationController::new();
        navigation.set_target(HighlightId::new("a"));

        assert!(!navigation.resolve_and_scroll(&store));
    }

    #[test]
    fn stale_registration_cannot_unbind_remounted_viewer() {
        let store = store_with(&["a"]);
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();

        let mut navigation = NavigationController::new();
        let old = navigation.register_scroll(first);
        let new = navigation.register_scroll(second);

        assert!(!navigation.unregister_scroll(old));
        navigation.set_target(HighlightId::new("a"));
        assert!(navigation.resolve_and_scroll(&store));

        assert!(first_seen.borrow().is_empty());
        assert_eq!(second_seen.borrow().len(), 1);

        assert!(navigation.unregister_scroll(new));
        assert!(!navigation.has_scroll_target());
    }
}
