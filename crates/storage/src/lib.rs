use highlight_model::{
    Comment, Content, DocumentRef, Highlight, HighlightId, ModelError, NewHighlight, Position,
};
use rusqlite::{params, Connection, ErrorCode};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS highlights (
    id TEXT PRIMARY KEY,
    pdf_url TEXT,
    position TEXT,
    content TEXT,
    comment TEXT
)";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("highlight {0} already exists")]
    Duplicate(HighlightId),
    #[error("stored highlight {id} is invalid: {source}")]
    Corrupt { id: String, source: ModelError },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Durable highlight records, one row per highlight keyed by id.
///
/// `position`, `content` and `comment` are stored as independent JSON documents.
#[derive(Debug)]
pub struct HighlightDb {
    conn: Connection,
}

impl HighlightDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All highlights stored for `document`, oldest first. Unknown documents yield an empty list.
    ///
    /// Rows that no longer decode into a valid highlight are skipped.
    pub fn list_for_document(&self, document: &DocumentRef) -> Result<Vec<Highlight>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pdf_url, position, content, comment FROM highlights
             WHERE pdf_url = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![document.as_str()], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                pdf_url: row.get(1)?,
                position: row.get(2)?,
                content: row.get(3)?,
                comment: row.get(4)?,
            })
        })?;

        let mut highlights = Vec::new();
        for row in rows {
            match row?.decode() {
                Ok(highlight) => highlights.push(highlight),
                Err(err) => tracing::warn!(%document, %err, "skipping unreadable highlight row"),
            }
        }

        Ok(highlights)
    }

    /// Insert a new record. An existing id is never overwritten.
    pub fn insert(&self, highlight: &Highlight) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "INSERT INTO highlights (id, pdf_url, position, content, comment)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                highlight.id().as_str(),
                highlight.document().as_str(),
                serde_json::to_string(highlight.position())?,
                serde_json::to_string(highlight.content())?,
                serde_json::to_string(highlight.comment())?,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Duplicate(highlight.id().clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns whether a row was removed. Removing an unknown id is not an error.
    pub fn delete(&self, id: &HighlightId) -> Result<bool, StorageError> {
        let removed = self.conn.execute("DELETE FROM highlights WHERE id = ?1", params![id.as_str()])?;
        if removed == 0 {
            tracing::debug!(%id, "delete of unknown highlight");
        }

        Ok(removed > 0)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM highlights", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

struct StoredRow {
    id: String,
    pdf_url: String,
    position: String,
    content: String,
    comment: String,
}

impl StoredRow {
    fn decode(self) -> Result<Highlight, StorageError> {
        let position: Position = serde_json::from_str(&self.position)?;
        let content: Content = serde_json::from_str(&self.content)?;
        let comment: Comment = serde_json::from_str(&self.comment)?;

        Highlight::new(
            HighlightId::new(self.id.clone()),
            DocumentRef::new(self.pdf_url),
            NewHighlight { position, content, comment },
        )
        .map_err(|source| StorageError::Corrupt { id: self.id, source })
    }
}

/// Directory of documents served to the viewer.
#[derive(Debug, Clone)]
pub struct DocumentLibrary {
    root: PathBuf,
}

impl DocumentLibrary {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File names of the PDFs in the library, sorted.
    pub fn list_pdfs(&self) -> Result<Vec<String>, StorageError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".pdf") {
                files.push(name);
            }
        }

        files.sort();
        Ok(files)
    }
}
