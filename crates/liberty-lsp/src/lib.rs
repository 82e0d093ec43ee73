//! # Liberty LSP
//!
//! Code-action annotations for diagnostics pushed by language servers.
//!
//! ## Pipeline
//!
//! A server pushes `textDocument/publishDiagnostics`; the diagnostics are
//! bound to spans of every open editor showing the document (markers).
//! An annotation pass then asks every applicable connection for the code
//! actions of each marker, one `textDocument/codeAction` per diagnostic:
//!
//! ```json
//! {"jsonrpc": "2.0", "id": 7, "method": "textDocument/codeAction",
//!  "params": {"textDocument": {"uri": "file:///app/Greeting.java"},
//!             "range": {...}, "context": {"diagnostics": [{...}]}}}
//! ```
//!
//! Answers are awaited under a single deadline. Whatever resolved in time is
//! rendered on the UI thread as highlights carrying the returned fixes; a
//! slow or failing server costs its fixes, never the pass.
//!
//! Transport and server lifecycle live outside this crate, behind
//! [`LanguageClient`].

pub mod annotator;
pub mod capability;
pub mod connection;
pub mod dispatch;
pub mod join;
pub mod markers;
pub mod registry;
pub mod render;
pub mod replay;
pub mod request;
pub mod ui;

pub use annotator::CodeActionAnnotator;
pub use capability::CodeActionSupport;
pub use connection::{Connection, ConnectionId, LanguageClient, ServerId};
pub use join::JoinOutcome;
pub use markers::{DiagnosticMarker, ElementLocator, MarkerStore, TokenLocator};
pub use registry::ConnectionPool;
pub use render::{
    Annotation, AnnotationHolder, AnnotationSink, AnnotationStore, HighlightSeverity, QuickFix,
};
pub use replay::{ReplayClient, ReplayScript};
pub use request::{AnnotationInfo, AnnotationResult, CodeActionRequest};
pub use ui::{UiExecutor, UiHandle, UiThread};

// Re-export LSP types
pub use lsp_types;

/// Result type for LSP operations
pub type LspResult<T> = Result<T, LspError>;

/// LSP client errors.
///
/// [`LanguageClient`] implementations report transport problems with
/// `RequestFailed`, `ServerExited` or `Timeout`; error responses from the
/// server itself are `ServerError`.
#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Server exited")]
    ServerExited,

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Refusing to wait for requests on the UI thread")]
    JoinOnUiThread,

    #[error("Annotations can only be applied on the UI thread")]
    NotOnUiThread,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
