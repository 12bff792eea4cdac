//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3003";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,
    /// SQLite database file; created with its parent directories when missing.
    pub database: PathBuf,
    /// Directory served under `/pdf` and listed by `/api/pdfs`.
    pub pdf_dir: PathBuf,
    /// The one origin allowed to call the API from a browser.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            database: PathBuf::from("highlights.db"),
            pdf_dir: PathBuf::from("pdf"),
            cors_origin: DEFAULT_CORS_ORIGIN.to_owned(),
        }
    }
}

impl ServerConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_database<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.database = path.as_ref().to_path_buf();
        self
    }

    pub fn with_pdf_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pdf_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer_setup() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:5000");
        assert_eq!(config.database, PathBuf::from("highlights.db"));
        assert_eq!(config.pdf_dir, PathBuf::from("pdf"));
        assert_eq!(config.cors_origin, "http://localhost:3003");
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ServerConfig::default()
            .with_bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)))
            .with_database("/tmp/h.db")
            .with_pdf_dir("/srv/pdf")
            .with_cors_origin("https://viewer.example");

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.database, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.pdf_dir, PathBuf::from("/srv/pdf"));
        assert_eq!(config.cors_origin, "https://viewer.example");
    }
}
