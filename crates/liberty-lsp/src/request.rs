//! Data handed between the pipeline stages.
//!
//! `collect` produces an [`AnnotationInfo`]; `resolve` fills its request
//! slots and freezes it into an [`AnnotationResult`]; `apply` consumes that
//! result exactly once.

use liberty_core::{Document, EditorId};
use lsp_types::CodeActionOrCommand;
use std::sync::{Arc, OnceLock};

use crate::connection::Connection;
use crate::markers::DiagnosticMarker;

/// Actions returned for one diagnostic.
pub type ActionList = Vec<CodeActionOrCommand>;

/// Write-once result of one request, shared with the task answering it.
pub(crate) type ActionSlot = Arc<OnceLock<ActionList>>;

/// An in-flight `textDocument/codeAction` for one marker on one connection.
#[derive(Debug, Clone)]
pub struct CodeActionRequest {
    marker: DiagnosticMarker,
    slot: ActionSlot,
}

impl CodeActionRequest {
    /// Creates an unresolved request for a marker.
    pub fn new(marker: DiagnosticMarker) -> Self {
        Self {
            marker,
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// Returns the marker the request is for.
    pub fn marker(&self) -> &DiagnosticMarker {
        &self.marker
    }

    /// Returns the actions once the request has resolved.
    pub fn actions(&self) -> Option<&[CodeActionOrCommand]> {
        self.slot.get().map(Vec::as_slice)
    }

    /// Returns true once a result (possibly empty) is attached.
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    pub(crate) fn slot(&self) -> ActionSlot {
        Arc::clone(&self.slot)
    }

    /// Attaches a result. Later results for the same request are ignored.
    pub(crate) fn resolve(&self, actions: ActionList) {
        let _ = self.slot.set(actions);
    }
}

/// The requests of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionRequests {
    /// Connection the requests go to
    pub connection: Arc<Connection>,
    /// One request per marker of the connection's server
    pub requests: Vec<CodeActionRequest>,
}

/// Everything collected for one editor before any request is sent.
#[derive(Debug, Clone)]
pub struct AnnotationInfo {
    /// Render pass number; later passes supersede earlier ones
    pub pass: u64,
    /// Editor being annotated
    pub editor: EditorId,
    /// Document snapshot the markers were read against
    pub document: Document,
    /// Per-connection requests
    pub entries: Vec<ConnectionRequests>,
}

impl AnnotationInfo {
    /// Total number of markers across connections.
    pub fn request_count(&self) -> usize {
        self.entries.iter().map(|e| e.requests.len()).sum()
    }
}

/// A marker together with the actions resolved for it.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    /// The marker
    pub marker: DiagnosticMarker,
    /// Resolved actions (possibly empty)
    pub actions: ActionList,
}

/// Resolved items of one connection.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    /// Connection that answered
    pub connection: Arc<Connection>,
    /// Items whose request resolved before the snapshot
    pub items: Vec<ResolvedItem>,
}

/// Frozen output of the resolve stage, consumed once by the renderer.
#[derive(Debug)]
pub struct AnnotationResult {
    /// Render pass number
    pub pass: u64,
    /// Editor being annotated
    pub editor: EditorId,
    /// Per-connection resolved items
    pub entries: Vec<ResolvedEntry>,
    /// Requests that had not resolved when the snapshot was taken
    pub unresolved: usize,
}

impl AnnotationResult {
    /// Freezes the requests of `info`; unresolved requests are left out.
    ///
    /// The returned value owns its data, so results arriving after this
    /// point cannot change what gets rendered.
    pub fn snapshot(info: AnnotationInfo) -> Self {
        let mut unresolved = 0;
        let entries = info
            .entries
            .into_iter()
            .map(|entry| {
                let items = entry
                    .requests
                    .into_iter()
                    .filter_map(|request| {
                        let Some(actions) = request.actions().map(<[_]>::to_vec) else {
                            unresolved += 1;
                            return None;
                        };
                        Some(ResolvedItem {
                            marker: request.marker,
                            actions,
                        })
                    })
                    .collect();
                ResolvedEntry {
                    connection: entry.connection,
                    items,
                }
            })
            .collect();

        Self {
            pass: info.pass,
            editor: info.editor,
            entries,
            unresolved,
        }
    }

    /// Total number of resolved items.
    pub fn item_count(&self) -> usize {
        self.entries.iter().map(|e| e.items.len()).sum()
    }
}
