//! Diagnostic markers: published diagnostics bound to live document spans.
//!
//! Each (editor, server) key holds exactly one batch, the one built from that
//! server's most recent `publishDiagnostics` for the editor's document. A
//! publish replaces the whole batch in one map insert; nothing is ever merged.
//! Batches carry a process-wide generation number so a render pass can tell
//! whether the markers it collected have been superseded in the meantime.

use dashmap::DashMap;
use liberty_core::{Document, EditorId};
use lsp_types::Diagnostic;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::connection::ServerId;

/// Finds the syntax element at an offset.
///
/// Used for zero-width diagnostics, which cannot carry an underline of their
/// own. Hosts with a real syntax tree plug theirs in here.
pub trait ElementLocator: Send + Sync {
    /// Returns the character range of the element at `offset`.
    fn element_at(&self, document: &Document, offset: usize) -> Range<usize>;
}

/// Word-boundary tokens of the document text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenLocator;

impl ElementLocator for TokenLocator {
    fn element_at(&self, document: &Document, offset: usize) -> Range<usize> {
        document
            .buffer()
            .token_at(offset)
            .unwrap_or(offset..offset)
    }
}

/// A diagnostic bound to a span of one editor's document.
#[derive(Debug, Clone)]
pub struct DiagnosticMarker {
    editor: EditorId,
    server: ServerId,
    generation: u64,
    diagnostic: Diagnostic,
    span: Range<usize>,
    text: String,
}

impl DiagnosticMarker {
    /// Returns the editor this marker belongs to.
    pub fn editor(&self) -> EditorId {
        self.editor
    }

    /// Returns the server that published the diagnostic.
    pub fn server(&self) -> &ServerId {
        &self.server
    }

    /// Returns the batch generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the diagnostic as received.
    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    /// Returns the bound character span.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Returns the document text under the span at binding time.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MarkerKey {
    editor: EditorId,
    server: ServerId,
}

#[derive(Debug)]
struct MarkerBatch {
    generation: u64,
    markers: Vec<DiagnosticMarker>,
}

/// Per-(editor, server) marker batches.
pub struct MarkerStore {
    batches: DashMap<MarkerKey, Arc<MarkerBatch>>,
    next_generation: AtomicU64,
    locator: Arc<dyn ElementLocator>,
}

impl MarkerStore {
    /// Creates a store that binds empty ranges to word tokens.
    pub fn new() -> Self {
        Self::with_locator(Arc::new(TokenLocator))
    }

    /// Creates a store with a host-provided element locator.
    pub fn with_locator(locator: Arc<dyn ElementLocator>) -> Self {
        Self {
            batches: DashMap::new(),
            next_generation: AtomicU64::new(1),
            locator,
        }
    }

    /// Replaces every marker of `(editor, server)` with one marker per
    /// diagnostic, bound against the current `document` text.
    ///
    /// Returns the generation of the new batch.
    pub fn replace_markers(
        &self,
        editor: EditorId,
        server: &ServerId,
        document: &Document,
        diagnostics: &[Diagnostic],
    ) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let markers = diagnostics
            .iter()
            .map(|diagnostic| {
                let span = self.materialize(document, diagnostic);
                let text = document.text_range(span.clone()).unwrap_or_default();
                DiagnosticMarker {
                    editor,
                    server: server.clone(),
                    generation,
                    diagnostic: diagnostic.clone(),
                    span,
                    text,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            %editor,
            %server,
            generation,
            count = markers.len(),
            "markers replaced"
        );

        let key = MarkerKey {
            editor,
            server: server.clone(),
        };
        self.batches
            .insert(key, Arc::new(MarkerBatch { generation, markers }));
        generation
    }

    /// Snapshot of the markers from the latest replace for this key.
    pub fn collect(&self, editor: EditorId, server: &ServerId) -> Vec<DiagnosticMarker> {
        self.batch(editor, server)
            .map(|batch| batch.markers.clone())
            .unwrap_or_default()
    }

    /// Generation of the current batch for this key.
    pub fn generation(&self, editor: EditorId, server: &ServerId) -> Option<u64> {
        self.batch(editor, server).map(|batch| batch.generation)
    }

    /// Returns true if the marker belongs to the current batch of its key.
    pub fn is_current(&self, marker: &DiagnosticMarker) -> bool {
        self.generation(marker.editor, &marker.server) == Some(marker.generation)
    }

    /// Drops the markers of one key.
    pub fn clear(&self, editor: EditorId, server: &ServerId) {
        self.batches.remove(&MarkerKey {
            editor,
            server: server.clone(),
        });
    }

    /// Drops every marker of an editor. Called when the editor closes.
    pub fn clear_editor(&self, editor: EditorId) {
        self.batches.retain(|key, _| key.editor != editor);
    }

    /// Returns the number of keys holding a batch.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns true if no batch is stored.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    fn batch(&self, editor: EditorId, server: &ServerId) -> Option<Arc<MarkerBatch>> {
        let key = MarkerKey {
            editor,
            server: server.clone(),
        };
        self.batches.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Maps the diagnostic's LSP range onto a character span of `document`.
    fn materialize(&self, document: &Document, diagnostic: &Diagnostic) -> Range<usize> {
        let buffer = document.buffer();
        let range = diagnostic.range;
        let start = buffer
            .utf16_position_to_char_idx(range.start.line as usize, range.start.character as usize);
        let end = buffer
            .utf16_position_to_char_idx(range.end.line as usize, range.end.character as usize)
            .max(start);

        if start == end {
            self.locator.element_at(document, start)
        } else {
            start..end
        }
    }
}

impl Default for MarkerStore {
    fn default() -> Self {
        Self::new()
    }
}
