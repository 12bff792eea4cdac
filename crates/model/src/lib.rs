//! Highlight data model shared by the sync layer, the gateway and the server.
//!
//! A highlight is either a text-range annotation (`content.text`) or a
//! free-region annotation carrying a screenshot (`content.image`). The wire
//! shape mirrors what the viewer posts to `/api/highlights`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview length used by list views before the text is elided.
pub const PREVIEW_CHARS: usize = 90;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("content must carry either text or an image")]
    EmptyContent,
    #[error("content cannot carry both text and an image")]
    AmbiguousContent,
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(u32),
    #[error("highlight {id} cannot change kind from {from} to {to}")]
    KindChange { id: HighlightId, from: HighlightKind, to: HighlightKind },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(String);

impl HighlightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HighlightId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Address of a document; the key its highlight set is stored under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference for a file served from the document directory of `base_url`.
    pub fn for_file(base_url: &str, filename: &str) -> Self {
        Self(format!("{}/pdf/{}", base_url.trim_end_matches('/'), filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

/// Source of fresh highlight ids. Generation never fails and never talks to the server.
pub trait IdGenerator {
    fn next_id(&mut self) -> HighlightId;
}

/// UUID v4 ids in simple (hex) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> HighlightId {
        HighlightId(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Deterministic ids (`<prefix>1`, `<prefix>2`, ...) for tests and fixtures.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), next: 1 }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> HighlightId {
        let id = HighlightId(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// Rectangle in page space, tagged with the render size it was captured at.
///
/// `width`/`height` are the page dimensions at capture time, so the rectangle
/// can be reprojected onto any other render scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in rendered (viewport) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScaledRect {
    pub fn from_viewport(rect: ViewportRect, page_width: f64, page_height: f64) -> Self {
        Self {
            x1: rect.left,
            y1: rect.top,
            x2: rect.left + rect.width,
            y2: rect.top + rect.height,
            width: page_width,
            height: page_height,
        }
    }

    /// Project onto a page rendered at `page_width` x `page_height` pixels.
    pub fn to_viewport(&self, page_width: f64, page_height: f64) -> ViewportRect {
        let sx = if self.width > 0.0 { page_width / self.width } else { 1.0 };
        let sy = if self.height > 0.0 { page_height / self.height } else { 1.0 };

        ViewportRect {
            left: self.x1 * sx,
            top: self.y1 * sy,
            width: (self.x2 - self.x1) * sx,
            height: (self.y2 - self.y1) * sy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub bounding_rect: ScaledRect,
    #[serde(default)]
    pub rects: Vec<ScaledRect>,
    pub page_number: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionPatch {
    pub bounding_rect: Option<ScaledRect>,
    pub rects: Option<Vec<ScaledRect>>,
    pub page_number: Option<u32>,
}

impl PositionPatch {
    pub fn bounding_rect(rect: ScaledRect) -> Self {
        Self { bounding_rect: Some(rect), ..Self::default() }
    }

    fn merged_into(&self, position: &Position) -> Position {
        Position {
            bounding_rect: self.bounding_rect.unwrap_or(position.bounding_rect),
            rects: self.rects.clone().unwrap_or_else(|| position.rects.clone()),
            page_number: self.page_number.unwrap_or(position.page_number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighlightKind {
    Text,
    Area,
}

impl fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighlightKind::Text => f.write_str("text"),
            HighlightKind::Area => f.write_str("area"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Screenshot of the selected region, usually a `data:image/png;base64,` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), image: None }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self { text: None, image: Some(image.into()) }
    }

    pub fn kind(&self) -> Result<HighlightKind, ModelError> {
        match (&self.text, &self.image) {
            (Some(_), None) => Ok(HighlightKind::Text),
            (None, Some(_)) => Ok(HighlightKind::Area),
            (Some(_), Some(_)) => Err(ModelError::AmbiguousContent),
            (None, None) => Err(ModelError::EmptyContent),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl ContentPatch {
    pub fn image(image: impl Into<String>) -> Self {
        Self { text: None, image: Some(image.into()) }
    }

    fn merged_into(&self, content: &Content) -> Content {
        Content {
            text: self.text.clone().or_else(|| content.text.clone()),
            image: self.image.clone().or_else(|| content.image.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub emoji: String,
}

impl Comment {
    pub fn new(text: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self { text: text.into(), emoji: emoji.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.emoji.is_empty()
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.emoji.is_empty(), self.text.is_empty()) {
            (true, _) => f.write_str(&self.text),
            (false, true) => f.write_str(&self.emoji),
            (false, false) => write!(f, "{} {}", self.emoji, self.text),
        }
    }
}

/// A completed user selection that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHighlight {
    pub position: Position,
    pub content: Content,
    pub comment: Comment,
}

impl NewHighlight {
    pub fn validate(&self) -> Result<HighlightKind, ModelError> {
        if self.position.page_number == 0 {
            return Err(ModelError::InvalidPage(self.position.page_number));
        }

        self.content.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    id: HighlightId,
    #[serde(rename = "pdfUrl")]
    document: DocumentRef,
    position: Position,
    content: Content,
    comment: Comment,
}

impl Highlight {
    pub fn new(
        id: HighlightId,
        document: DocumentRef,
        highlight: NewHighlight,
    ) -> Result<Self, ModelError> {
        highlight.validate()?;
        let NewHighlight { position, content, comment } = highlight;

        Ok(Self { id, document, position, content, comment })
    }

    pub fn id(&self) -> &HighlightId {
        &self.id
    }

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn page_number(&self) -> u32 {
        self.position.page_number
    }

    pub fn kind(&self) -> Result<HighlightKind, ModelError> {
        self.content.kind()
    }

    /// Check the invariants of a highlight received from elsewhere.
    pub fn validate(&self) -> Result<HighlightKind, ModelError> {
        if self.id.as_str().is_empty() {
            return Err(ModelError::MissingField("id"));
        }
        if self.document.as_str().is_empty() {
            return Err(ModelError::MissingField("pdfUrl"));
        }
        if self.position.page_number == 0 {
            return Err(ModelError::InvalidPage(self.position.page_number));
        }

        self.content.kind()
    }

    /// Field-level merge of position and content, applied atomically.
    ///
    /// Nothing changes when the merged content would switch the highlight's kind.
    pub fn apply_patch(
        &mut self,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> Result<(), ModelError> {
        let from = self.content.kind()?;
        let merged_content = content.merged_into(&self.content);
        let to = match merged_content.kind() {
            Ok(kind) => kind,
            Err(_) => match from {
                HighlightKind::Text => HighlightKind::Area,
                HighlightKind::Area => HighlightKind::Text,
            },
        };

        if from != to {
            return Err(ModelError::KindChange { id: self.id.clone(), from, to });
        }

        let merged_position = position.merged_into(&self.position);
        if merged_position.page_number == 0 {
            return Err(ModelError::InvalidPage(0));
        }

        self.position = merged_position;
        self.content = merged_content;
        Ok(())
    }

    /// Short text for list views: the quoted text elided at [`PREVIEW_CHARS`], or a marker
    /// for screenshots.
    pub fn preview(&self) -> String {
        match (&self.content.text, &self.content.image) {
            (Some(text), _) => {
                let head: String = text.chars().take(PREVIEW_CHARS).collect();
                if text.chars().count() > PREVIEW_CHARS {
                    format!("{}…", head.trim())
                } else {
                    head.trim().to_owned()
                }
            }
            (None, Some(_)) => "[screenshot]".to_owned(),
            (None, None) => String::new(),
        }
    }
}

/// `POST /api/highlights` body. Every field is optional on the wire so a missing
/// one can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlightRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
}

impl CreateHighlightRequest {
    pub fn into_highlight(self) -> Result<Highlight, ModelError> {
        let id = self.id.filter(|id| !id.is_empty()).ok_or(ModelError::MissingField("id"))?;
        let pdf_url =
            self.pdf_url.filter(|url| !url.is_empty()).ok_or(ModelError::MissingField("pdfUrl"))?;
        let position = self.position.ok_or(ModelError::MissingField("position"))?;
        let content = self.content.ok_or(ModelError::MissingField("content"))?;
        let comment = self.comment.ok_or(ModelError::MissingField("comment"))?;

        Highlight::new(
            HighlightId(id),
            DocumentRef(pdf_url),
            NewHighlight { position, content, comment },
        )
    }
}

impl From<&Highlight> for CreateHighlightRequest {
    fn from(highlight: &Highlight) -> Self {
        Self {
            id: Some(highlight.id.0.clone()),
            pdf_url: Some(highlight.document.0.clone()),
            position: Some(highlight.position.clone()),
            content: Some(highlight.content.clone()),
            comment: Some(highlight.comment.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> ScaledRect {
        ScaledRect { x1: 10.5, y1: 20.5, x2: 110.5, y2: 40.5, width: 800.5, height: 1200.5 }
    }

    fn text_selection(text: &str) -> NewHighlight {
        NewHighlight {
            position: Position { bounding_rect: rect(), rects: Vec::new(), page_number: 1 },
            content: Content::text(text),
            comment: Comment::new("note", ""),
        }
    }

    fn area_highlight() -> Highlight {
        Highlight::new(
            HighlightId::new("a1"),
            DocumentRef::new("doc1"),
            NewHighlight {
                position: Position { bounding_rect: rect(), rects: Vec::new(), page_number: 2 },
                content: Content::image("data:image/png;base64,AAAA"),
                comment: Comment::default(),
            },
        )
        .expect("area highlight should be valid")
    }

    #[test]
    fn wire_format_matches_http_contract() {
        let highlight =
            Highlight::new(HighlightId::new("h1"), DocumentRef::new("doc1"), text_selection("abc"))
                .expect("highlight should be valid");

        insta::assert_json_snapshot!(highlight, @r#"
        {
          "id": "h1",
          "pdfUrl": "doc1",
          "position": {
            "boundingRect": {
              "x1": 10.5,
              "y1": 20.5,
              "x2": 110.5,
              "y2": 40.5,
              "width": 800.5,
              "height": 1200.5
            },
            "rects": [],
            "pageNumber": 1
          },
          "content": {
            "text": "abc"
          },
          "comment": {
            "text": "note",
            "emoji": ""
          }
        }
        "#);
    }

    #[test]
    fn content_kind_requires_exactly_one_payload() {
        assert_eq!(Content::text("x").kind(), Ok(HighlightKind::Text));
        assert_eq!(Content::image("img").kind(), Ok(HighlightKind::Area));
        assert_eq!(Content::default().kind(), Err(ModelError::EmptyContent));

        let both = Content { text: Some("x".to_owned()), image: Some("img".to_owned()) };
        assert_eq!(both.kind(), Err(ModelError::AmbiguousContent));
    }

    #[test]
    fn page_zero_is_rejected() {
        let mut selection = text_selection("abc");
        selection.position.page_number = 0;

        assert_eq!(selection.validate(), Err(ModelError::InvalidPage(0)));
    }

    #[test]
    fn resize_patch_merges_position_and_image_together() {
        let mut highlight = area_highlight();
        let resized = ScaledRect { x2: 300.5, ..rect() };

        highlight
            .apply_patch(&PositionPatch::bounding_rect(resized), &ContentPatch::image("new"))
            .expect("resize should apply");

        assert_eq!(highlight.position().bounding_rect, resized);
        assert_eq!(highlight.position().page_number, 2);
        assert_eq!(highlight.content().image.as_deref(), Some("new"));
        assert_eq!(highlight.kind(), Ok(HighlightKind::Area));
    }

    #[test]
    fn patch_that_changes_kind_leaves_highlight_untouched() {
        let mut highlight = area_highlight();
        let before = highlight.clone();

        let patch = ContentPatch { text: Some("text".to_owned()), image: None };
        let result = highlight.apply_patch(&PositionPatch::bounding_rect(rect()), &patch);

        assert!(matches!(result, Err(ModelError::KindChange { .. })));
        assert_eq!(highlight, before);
    }

    #[test]
    fn create_request_reports_first_missing_field() {
        let highlight =
            Highlight::new(HighlightId::new("h1"), DocumentRef::new("doc1"), text_selection("abc"))
                .expect("highlight should be valid");

        let mut request = CreateHighlightRequest::from(&highlight);
        request.content = None;
        assert_eq!(request.into_highlight(), Err(ModelError::MissingField("content")));

        let mut request = CreateHighlightRequest::from(&highlight);
        request.id = Some(String::new());
        assert_eq!(request.into_highlight(), Err(ModelError::MissingField("id")));

        let request = CreateHighlightRequest::from(&highlight);
        assert_eq!(request.into_highlight(), Ok(highlight));
    }

    #[test]
    fn create_request_parses_body_without_content() {
        let body = r#"{"id":"h1","pdfUrl":"doc1","position":{"boundingRect":{"x1":1,"y1":2,"x2":3,"y2":4,"width":10,"height":10},"rects":[],"pageNumber":1},"comment":{"text":"note"}}"#;
        let request: CreateHighlightRequest =
            serde_json::from_str(body).expect("body should parse");

        assert!(request.content.is_none());
        assert_eq!(request.into_highlight(), Err(ModelError::MissingField("content")));
    }

    #[test]
    fn reprojection_scales_to_new_render_size() {
        let scaled = ScaledRect { x1: 100.0, y1: 50.0, x2: 300.0, y2: 150.0, width: 1000.0, height: 500.0 };

        let viewport = scaled.to_viewport(500.0, 250.0);
        assert_eq!(viewport, ViewportRect { left: 50.0, top: 25.0, width: 100.0, height: 50.0 });

        let back = ScaledRect::from_viewport(viewport, 500.0, 250.0);
        assert_eq!(back.to_viewport(1000.0, 500.0), scaled.to_viewport(1000.0, 500.0));
    }

    #[test]
    fn preview_elides_long_text() {
        let long = "x".repeat(PREVIEW_CHARS + 10);
        let highlight =
            Highlight::new(HighlightId::new("h1"), DocumentRef::new("doc1"), text_selection(&long))
                .expect("highlight should be valid");

        let preview = highlight.preview();
        assert!(preview.ends_with('…'));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(area_highlight().preview(), "[screenshot]");
    }

    #[test]
    fn sequential_ids_are_distinct() {
        let mut ids = SequentialIds::new("h");
        assert_eq!(ids.next_id().as_str(), "h1");
        assert_eq!(ids.next_id().as_str(), "h2");

        let mut random = RandomIds;
        assert_ne!(random.next_id(), random.next_id());
    }

    #[test]
    fn document_ref_for_file_joins_base_url() {
        let reference = DocumentRef::for_file("http://localhost:5000/", "paper.pdf");
        assert_eq!(reference.as_str(), "http://localhost:5000/pdf/paper.pdf");
    }

    #[test]
    fn comment_display_prefixes_emoji() {
        assert_eq!(Comment::new("note", "💡").to_string(), "💡 note");
        assert_eq!(Comment::new("note", "").to_string(), "note");
        assert!(Comment::default().is_empty());
    }
}
