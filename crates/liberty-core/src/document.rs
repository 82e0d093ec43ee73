//! Document management.
//!
//! A document is the text of one file plus the URI language servers know it
//! by. Editors (see [`crate::editor`]) are views onto a document; several
//! editors may show the same document.

use liberty_buffer::TextBuffer;
use lsp_types::Uri;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::workspace::file_uri;
use crate::CoreResult;

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new unique document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single file being edited.
///
/// Cloning is cheap (the rope shares its storage), which is how background
/// tasks take a consistent snapshot of the text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Unique identifier
    id: DocumentId,

    /// URI as seen by language servers
    uri: Uri,

    /// File path (None for documents not backed by a local file)
    path: Option<PathBuf>,

    /// Display name
    name: String,

    /// Language id used to match server definitions
    language: Option<String>,

    /// The underlying text buffer
    buffer: TextBuffer,
}

impl Document {
    /// Creates a document from in-memory text.
    pub fn new(uri: Uri, text: &str) -> Self {
        let name = uri
            .as_str()
            .rsplit('/')
            .next()
            .unwrap_or("Untitled")
            .to_string();
        let language = language_for_file_name(&name);

        Self {
            id: DocumentId::new(),
            uri,
            path: None,
            name,
            language,
            buffer: TextBuffer::from(text),
        }
    }

    /// Opens a document from a file.
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let buffer = TextBuffer::from_file(path)?;
        let uri = file_uri(path)?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Unknown")
            .to_string();
        let language = language_for_file_name(&name);

        Ok(Self {
            id: DocumentId::new(),
            uri,
            path: Some(path.to_path_buf()),
            name,
            language,
            buffer,
        })
    }

    // ==================== Getters ====================

    /// Returns the document ID.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the document URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the file path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the detected language.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the text buffer.
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Returns a mutable reference to the buffer.
    pub fn buffer_mut(&mut self) -> &mut TextBuffer {
        &mut self.buffer
    }

    /// Returns all text.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        self.buffer.text()
    }

    /// Returns the text covered by a character range.
    pub fn text_range(&self, range: Range<usize>) -> CoreResult<String> {
        Ok(self.buffer.slice(range)?.into_owned())
    }

    /// Returns the buffer's edit counter.
    pub fn version(&self) -> u64 {
        self.buffer.version()
    }
}

/// Detects the language id from a file name.
///
/// Liberty configuration files are recognised by name before falling back
/// to the extension: `server.env` is a properties-style file with its own
/// language, distinct from `bootstrap.properties`.
pub fn language_for_file_name(name: &str) -> Option<String> {
    let language = match name {
        "server.env" => "serverenv",
        "bootstrap.properties" => "bootstrap",
        "microprofile-config.properties" => "microprofile-properties",
        _ => {
            let ext = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())?
                .to_lowercase();
            match ext.as_str() {
                "java" => "java",
                "properties" => "properties",
                "xml" => "xml",
                "yaml" | "yml" => "yaml",
                "json" => "json",
                "env" => "serverenv",
                _ => return Some(ext),
            }
        }
    };
    Some(language.to_string())
}
