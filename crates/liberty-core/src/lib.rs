//! # Liberty Core
//!
//! The host-side model the annotation pipeline reads from: documents, the
//! editors currently showing them, the workspace they belong to, editor
//! events and configuration.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   Workbench                    │
//! │  ┌──────────────┐        ┌──────────────────┐  │
//! │  │  Documents   │◄───────│  Open editors    │  │
//! │  │ (by URI/id)  │        │ (EditorId → doc) │  │
//! │  └──────────────┘        └──────────────────┘  │
//! │          │                        │            │
//! │     Workspace               EventBus           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Everything here is `Send + Sync`: diagnostics arrive on background tasks
//! and must be able to look up editors without going through the UI thread.

pub mod config;
pub mod document;
pub mod editor;
pub mod event;
pub mod workspace;

pub use config::{AnnotatorConfig, Config, ServerConfig};
pub use document::{Document, DocumentId};
pub use editor::{EditorId, Workbench};
pub use event::{EditorEvent, EventBus, EventHandler};
pub use workspace::{Workspace, file_uri};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Editor not found: {0}")]
    EditorNotFound(EditorId),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Resource outside workspace: {0}")]
    OutsideWorkspace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] liberty_buffer::BufferError),
}
