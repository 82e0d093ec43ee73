//! Open documents and the editors showing them.
//!
//! `Workbench` is the host model the annotation pipeline consults: "which
//! editors currently show this URI" when diagnostics arrive, and "what is the
//! current text of this editor's document" when markers are materialized.
//!
//! ## Thread Safety
//!
//! Diagnostics are published from background tasks, so both maps are
//! `DashMap`s and every read hands out a cloned snapshot rather than a guard.

use dashmap::DashMap;
use lsp_types::Uri;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use uuid::Uuid;

use crate::document::{Document, DocumentId};
use crate::event::{EditorEvent, EventBus};
use crate::workspace::Workspace;
use crate::{CoreError, CoreResult};

/// Identity of one editor (a view onto a document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EditorId(Uuid);

impl EditorId {
    /// Creates a new unique editor ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EditorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EditorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Documents, editors and the workspace they live in.
pub struct Workbench {
    /// Project root used to resolve URIs
    workspace: Workspace,

    /// All open documents
    documents: DashMap<DocumentId, Document>,

    /// Editor → the document it shows
    editors: DashMap<EditorId, DocumentId>,

    /// Event bus for notifications
    event_bus: EventBus,
}

impl Workbench {
    /// Creates an empty workbench for a workspace.
    pub fn new(workspace: Workspace) -> Self {
        Self::with_event_bus(workspace, EventBus::new())
    }

    /// Creates a workbench that publishes on an existing bus.
    pub fn with_event_bus(workspace: Workspace, event_bus: EventBus) -> Self {
        Self {
            workspace,
            documents: DashMap::new(),
            editors: DashMap::new(),
            event_bus,
        }
    }

    /// Returns the workspace.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Returns the event bus.
    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    // ==================== Editors ====================

    /// Opens an editor on a document, reusing an already open document with
    /// the same URI.
    pub fn open(&self, document: Document) -> EditorId {
        let doc_id = self
            .find_by_uri(document.uri())
            .unwrap_or_else(|| {
                let id = document.id();
                self.documents.insert(id, document);
                id
            });

        let editor = EditorId::new();
        self.editors.insert(editor, doc_id);
        tracing::debug!(%editor, document = %doc_id, "editor opened");
        self.event_bus.emit(EditorEvent::EditorOpened(editor));
        editor
    }

    /// Opens a file from disk in a new editor.
    pub fn open_file(&self, path: impl AsRef<Path>) -> CoreResult<EditorId> {
        let document = Document::from_file(self.workspace.resolve(path))?;
        Ok(self.open(document))
    }

    /// Closes an editor. The document is dropped with its last editor.
    pub fn close(&self, editor: EditorId) -> CoreResult<()> {
        let (_, doc_id) = self
            .editors
            .remove(&editor)
            .ok_or(CoreError::EditorNotFound(editor))?;

        let still_shown = self.editors.iter().any(|entry| *entry.value() == doc_id);
        if !still_shown {
            self.documents.remove(&doc_id);
        }

        tracing::debug!(%editor, "editor closed");
        self.event_bus.emit(EditorEvent::EditorClosed(editor));
        Ok(())
    }

    /// Returns every open editor showing the document with this URI.
    pub fn editors_for(&self, uri: &Uri) -> Vec<EditorId> {
        let Some(doc_id) = self.find_by_uri(uri) else {
            return Vec::new();
        };
        let mut editors: Vec<EditorId> = self
            .editors
            .iter()
            .filter(|entry| *entry.value() == doc_id)
            .map(|entry| *entry.key())
            .collect();
        editors.sort();
        editors
    }

    /// Returns all open editors.
    pub fn editors(&self) -> Vec<EditorId> {
        self.editors.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns true if the editor is still open.
    pub fn is_open(&self, editor: EditorId) -> bool {
        self.editors.contains_key(&editor)
    }

    // ==================== Documents ====================

    /// Returns a snapshot of the document an editor shows.
    pub fn document_for(&self, editor: EditorId) -> CoreResult<Document> {
        let doc_id = *self
            .editors
            .get(&editor)
            .ok_or(CoreError::EditorNotFound(editor))?;
        self.document(doc_id)
    }

    /// Returns a snapshot of a document.
    pub fn document(&self, id: DocumentId) -> CoreResult<Document> {
        self.documents
            .get(&id)
            .map(|doc| doc.clone())
            .ok_or(CoreError::DocumentNotFound(id))
    }

    /// Finds a document by URI.
    pub fn find_by_uri(&self, uri: &Uri) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|entry| entry.value().uri() == uri)
            .map(|entry| *entry.key())
    }

    /// Returns the current text of an editor's document in a character range.
    pub fn text(&self, editor: EditorId, range: Range<usize>) -> CoreResult<String> {
        self.document_for(editor)?.text_range(range)
    }

    /// Replaces a character range of a document.
    pub fn edit(&self, id: DocumentId, range: Range<usize>, text: &str) -> CoreResult<()> {
        {
            let mut doc = self
                .documents
                .get_mut(&id)
                .ok_or(CoreError::DocumentNotFound(id))?;
            doc.buffer_mut().replace(range, text)?;
        }
        self.event_bus.emit(EditorEvent::DocumentChanged(id));
        Ok(())
    }

    /// Returns the number of open documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbench() -> Workbench {
        Workbench::new(Workspace::with_root("/demo"))
    }

    fn doc(path: &str, text: &str) -> Document {
        Document::new(format!("file://{path}").parse().unwrap(), text)
    }

    #[test]
    fn test_two_editors_share_one_document() {
        let bench = workbench();
        let first = bench.open(doc("/demo/Greeting.java", "class Greeting {}"));
        let second = bench.open(doc("/demo/Greeting.java", "ignored"));
        let other = bench.open(doc("/demo/server.env", "A=1"));

        assert_eq!(bench.document_count(), 2);
        let uri: Uri = "file:///demo/Greeting.java".parse().unwrap();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(bench.editors_for(&uri), expected);
        assert_eq!(bench.document_for(second).unwrap().text(), "class Greeting {}");
        assert!(!bench.editors_for(&uri).contains(&other));
    }

    #[test]
    fn test_close_drops_document_with_last_editor() {
        let bench = workbench();
        let first = bench.open(doc("/demo/a.properties", "a=1"));
        let second = bench.open(doc("/demo/a.properties", "a=1"));

        bench.close(first).unwrap();
        assert_eq!(bench.document_count(), 1);
        bench.close(second).unwrap();
        assert_eq!(bench.document_count(), 0);
        assert!(matches!(bench.close(second), Err(CoreError::EditorNotFound(_))));
    }

    #[test]
    fn test_edit_is_visible_through_editor() {
        let bench = workbench();
        let editor = bench.open(doc("/demo/a.properties", "port=9080"));
        let id = bench.document_for(editor).unwrap().id();

        bench.edit(id, 5..9, "9443").unwrap();
        assert_eq!(bench.text(editor, 0..9).unwrap(), "port=9443");
    }

    #[tokio::test]
    async fn test_open_and_close_emit_events() {
        let bench = workbench();
        let mut rx = bench.events().subscribe();

        let editor = bench.open(doc("/demo/a.properties", "a=1"));
        bench.close(editor).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), EditorEvent::EditorOpened(id) if id == editor));
        assert!(matches!(rx.recv().await.unwrap(), EditorEvent::EditorClosed(id) if id == editor));
    }
}
