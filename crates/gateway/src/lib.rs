//! HTTP client for the highlight server.
//!
//! [`HttpGateway`] implements [`HighlightGateway`] over the JSON API served by
//! `highlight-server`. Calls block; run them through a
//! [`highlight_sync::Dispatcher`] to keep them off the viewer's thread.

use highlight_model::{CreateHighlightRequest, DocumentRef, Highlight, HighlightId};
use highlight_sync::{GatewayError, HighlightGateway};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_owned(), timeout: DEFAULT_TIMEOUT }
    }
}

impl GatewayConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SuccessBody {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        Self { agent, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reference of a file served from the server's document directory.
    pub fn document_ref(&self, filename: &str) -> DocumentRef {
        DocumentRef::for_file(&self.base_url, filename)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `/api/highlights/<id>` with the id percent-encoded as one path segment.
    fn highlight_url(&self, id: &HighlightId) -> Result<String, GatewayError> {
        let mut url = url::Url::parse(&self.url("/api/highlights"))
            .map_err(|err| GatewayError::Transport(format!("invalid server url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport(format!("invalid server url: {}", self.base_url)))?
            .push(id.as_str());
        Ok(url.into())
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HighlightGateway for HttpGateway {
    fn list_documents(&self) -> Result<Vec<String>, GatewayError> {
        let url = self.url("/api/pdfs");
        tracing::debug!(%url, "listing documents");

        let response = self.agent.get(&url).call().map_err(map_error)?;
        read_json(response)
    }

    fn list_for_document(&self, document: &DocumentRef) -> Result<Vec<Highlight>, GatewayError> {
        let url = self.url("/api/highlights");
        tracing::debug!(%url, %document, "listing highlights");

        let response =
            self.agent.get(&url).query("pdfUrl", document.as_str()).call().map_err(map_error)?;
        read_json(response)
    }

    fn create(&self, highlight: &Highlight) -> Result<(), GatewayError> {
        let url = self.url("/api/highlights");
        tracing::debug!(%url, id = %highlight.id(), "creating highlight");

        let response = self
            .agent
            .post(&url)
            .send_json(CreateHighlightRequest::from(highlight))
            .map_err(|err| map_create_error(err, highlight.id()))?;

        let body: SuccessBody = read_json(response)?;
        if body.success {
            Ok(())
        } else {
            Err(GatewayError::Transport(format!("server did not store highlight {}", highlight.id())))
        }
    }

    fn delete(&self, id: &HighlightId) -> Result<bool, GatewayError> {
        let url = self.highlight_url(id)?;
        tracing::debug!(%url, "deleting highlight");

        let response = self.agent.delete(&url).call().map_err(map_error)?;
        let body: SuccessBody = read_json(response)?;
        Ok(body.success)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    response
        .into_json()
        .map_err(|err| GatewayError::Transport(format!("invalid response body: {err}")))
}

fn map_create_error(err: ureq::Error, id: &HighlightId) -> GatewayError {
    match err {
        ureq::Error::Status(409, _) => GatewayError::Duplicate(id.clone()),
        other => map_error(other),
    }
}

fn map_error(err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Status(status, response) if (400..500).contains(&status) => {
            GatewayError::Validation(error_message(status, response))
        }
        ureq::Error::Status(status, response) => {
            GatewayError::Transport(error_message(status, response))
        }
        ureq::Error::Transport(transport) => GatewayError::Transport(transport.to_string()),
    }
}

fn error_message(status: u16, response: ureq::Response) -> String {
    match response.into_json::<ErrorBody>() {
        Ok(body) => body.error,
        Err(_) => format!("server responded with status {status}"),
    }
}
