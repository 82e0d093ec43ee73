//! Turns a resolved pass into editor annotations.
//!
//! Every pass builds into a fresh [`AnnotationHolder`] and hands the whole
//! batch to an [`AnnotationSink`], which replaces whatever the editor showed
//! before. Nothing is patched incrementally.

use dashmap::DashMap;
use liberty_core::EditorId;
use lsp_types::{CodeActionOrCommand, DiagnosticSeverity};
use std::ops::Range;

use crate::connection::ConnectionId;
use crate::markers::MarkerStore;
use crate::request::AnnotationResult;

/// Highlight kinds the host knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HighlightSeverity {
    Error,
    Warning,
    Information,
}

/// Maps an LSP severity onto a highlight kind.
///
/// Total: hints, information, unknown values and a missing severity all
/// render as [`HighlightSeverity::Information`].
pub fn highlight_severity(severity: Option<DiagnosticSeverity>) -> HighlightSeverity {
    match severity {
        Some(DiagnosticSeverity::ERROR) => HighlightSeverity::Error,
        Some(DiagnosticSeverity::WARNING) => HighlightSeverity::Warning,
        _ => HighlightSeverity::Information,
    }
}

/// A fix offered on an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickFix {
    /// Menu title
    pub title: String,
    /// Connection that proposed the fix; executing it goes back there
    pub connection: ConnectionId,
    /// The command or code action as returned by the server
    pub action: CodeActionOrCommand,
}

impl QuickFix {
    /// Wraps an action returned by `connection`.
    pub fn new(connection: ConnectionId, action: CodeActionOrCommand) -> Self {
        let title = match &action {
            CodeActionOrCommand::Command(command) => command.title.clone(),
            CodeActionOrCommand::CodeAction(action) => action.title.clone(),
        };
        Self {
            title,
            connection,
            action,
        }
    }
}

/// One highlight over a character span.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub severity: HighlightSeverity,
    pub message: String,
    pub tooltip: Option<String>,
    pub range: Range<usize>,
    /// Server that published the diagnostic
    pub source: String,
    pub fixes: Vec<QuickFix>,
}

/// Collects the annotations of one pass.
#[derive(Debug, Default)]
pub struct AnnotationHolder {
    annotations: Vec<Annotation>,
}

impl AnnotationHolder {
    /// Creates an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an annotation; it is added when [`AnnotationBuilder::create`]
    /// is called.
    pub fn new_annotation(
        &mut self,
        severity: HighlightSeverity,
        message: impl Into<String>,
    ) -> AnnotationBuilder<'_> {
        AnnotationBuilder {
            holder: self,
            annotation: Annotation {
                severity,
                message: message.into(),
                tooltip: None,
                range: 0..0,
                source: String::new(),
                fixes: Vec::new(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn into_annotations(self) -> Vec<Annotation> {
        self.annotations
    }
}

/// Builder returned by [`AnnotationHolder::new_annotation`].
#[must_use = "annotations are only added by `create`"]
pub struct AnnotationBuilder<'a> {
    holder: &'a mut AnnotationHolder,
    annotation: Annotation,
}

impl AnnotationBuilder<'_> {
    pub fn range(mut self, range: Range<usize>) -> Self {
        self.annotation.range = range;
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.annotation.tooltip = Some(tooltip.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.annotation.source = source.into();
        self
    }

    pub fn with_fix(mut self, fix: QuickFix) -> Self {
        self.annotation.fixes.push(fix);
        self
    }

    /// Adds the annotation to the holder.
    pub fn create(self) {
        self.holder.annotations.push(self.annotation);
    }
}

/// Where finished annotations go. Called on the UI thread only.
pub trait AnnotationSink: Send + Sync {
    /// Replaces everything shown in `editor` with `annotations`.
    fn apply(&self, editor: EditorId, annotations: Vec<Annotation>);

    /// Removes everything shown in `editor`.
    fn clear(&self, editor: EditorId);
}

/// In-memory sink, keyed by editor.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    editors: DashMap<EditorId, Vec<Annotation>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns what `editor` currently shows.
    pub fn annotations(&self, editor: EditorId) -> Vec<Annotation> {
        self.editors
            .get(&editor)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns true if the store holds annotations for `editor`.
    pub fn contains(&self, editor: EditorId) -> bool {
        self.editors.contains_key(&editor)
    }
}

impl AnnotationSink for AnnotationStore {
    fn apply(&self, editor: EditorId, annotations: Vec<Annotation>) {
        self.editors.insert(editor, annotations);
    }

    fn clear(&self, editor: EditorId) {
        self.editors.remove(&editor);
    }
}

/// Builds the annotations of one resolved pass.
///
/// Markers superseded by a later publish since the pass was collected are
/// skipped.
pub fn render(result: AnnotationResult, markers: &MarkerStore) -> AnnotationHolder {
    let mut holder = AnnotationHolder::new();
    let mut stale = 0usize;

    for entry in result.entries {
        let connection = entry.connection.id();
        for item in entry.items {
            if !markers.is_current(&item.marker) {
                stale += 1;
                continue;
            }

            let diagnostic = item.marker.diagnostic();
            let mut builder = holder
                .new_annotation(highlight_severity(diagnostic.severity), &diagnostic.message)
                .range(item.marker.span())
                .tooltip(&diagnostic.message)
                .source(item.marker.server().as_str());
            for action in item.actions {
                builder = builder.with_fix(QuickFix::new(connection, action));
            }
            builder.create();
        }
    }

    if stale > 0 {
        tracing::debug!(editor = %result.editor, pass = result.pass, stale, "skipped superseded markers");
    }
    holder
}
