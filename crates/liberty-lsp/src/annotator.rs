//! The code-action annotator.
//!
//! Three stages joined by plain data:
//!
//! ```text
//!  collect (any thread)     resolve (async, background)     apply (UI thread)
//!  ────────────────────     ───────────────────────────     ─────────────────
//!  registry + markers  ──►  dispatch ──► join(deadline) ──► render ──► sink
//!        AnnotationInfo                     AnnotationResult
//! ```
//!
//! Diagnostics pushed by a server go through [`CodeActionAnnotator::on_publish_diagnostics`],
//! which replaces the markers of every editor showing the document and, when
//! `render_on_publish` is set, starts a fresh pass for each of them.

use dashmap::DashMap;
use liberty_core::{AnnotatorConfig, EditorEvent, EditorId, EventHandler, Workbench};
use lsp_types::PublishDiagnosticsParams;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

use crate::connection::ServerId;
use crate::dispatch::dispatch;
use crate::join::{JoinOutcome, join};
use crate::markers::{ElementLocator, MarkerStore};
use crate::registry::ConnectionPool;
use crate::render::{AnnotationSink, render};
use crate::request::{AnnotationInfo, AnnotationResult, CodeActionRequest, ConnectionRequests};
use crate::ui::{UiExecutor, is_ui_thread};
use crate::{LspError, LspResult};

/// Drives annotation passes for every open editor.
pub struct CodeActionAnnotator {
    workbench: Arc<Workbench>,
    pool: Arc<ConnectionPool>,
    markers: MarkerStore,
    ui: Arc<dyn UiExecutor>,
    sink: Arc<dyn AnnotationSink>,
    config: AnnotatorConfig,
    next_pass: AtomicU64,
    /// Latest pass applied per editor
    applied: DashMap<EditorId, u64>,
}

impl CodeActionAnnotator {
    pub fn new(
        workbench: Arc<Workbench>,
        pool: Arc<ConnectionPool>,
        ui: Arc<dyn UiExecutor>,
        sink: Arc<dyn AnnotationSink>,
        config: AnnotatorConfig,
    ) -> Self {
        Self {
            workbench,
            pool,
            markers: MarkerStore::new(),
            ui,
            sink,
            config,
            next_pass: AtomicU64::new(1),
            applied: DashMap::new(),
        }
    }

    /// Uses the host's syntax elements for zero-width diagnostics.
    pub fn with_locator(mut self, locator: Arc<dyn ElementLocator>) -> Self {
        self.markers = MarkerStore::with_locator(locator);
        self
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn workbench(&self) -> &Arc<Workbench> {
        &self.workbench
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// First stage: snapshots connections and markers for `editor`.
    ///
    /// Returns `None` if the editor is not open.
    pub fn collect(&self, editor: EditorId) -> Option<AnnotationInfo> {
        let document = match self.workbench.document_for(editor) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!(%editor, "nothing to collect: {}", e);
                return None;
            }
        };

        let entries: Vec<ConnectionRequests> = self
            .pool
            .resolve(&document, |_| true)
            .into_iter()
            .map(|connection| ConnectionRequests {
                requests: self
                    .markers
                    .collect(editor, connection.server_id())
                    .into_iter()
                    .map(CodeActionRequest::new)
                    .collect(),
                connection,
            })
            .collect();

        let info = AnnotationInfo {
            pass: self.next_pass.fetch_add(1, Ordering::Relaxed),
            editor,
            document,
            entries,
        };
        tracing::debug!(
            %editor,
            pass = info.pass,
            connections = info.entries.len(),
            requests = info.request_count(),
            "annotation info collected"
        );
        Some(info)
    }

    /// Second stage: sends the requests and waits for them, bounded by the
    /// configured timeout.
    ///
    /// Must not run on the UI thread.
    pub async fn resolve(&self, info: AnnotationInfo) -> LspResult<AnnotationResult> {
        let pending = dispatch(&info);
        let outcome = join(pending, self.config.code_action_timeout()).await?;

        let result = AnnotationResult::snapshot(info);
        if let JoinOutcome::TimedOut { outstanding } = outcome {
            tracing::debug!(
                editor = %result.editor,
                pass = result.pass,
                outstanding,
                "rendering partial results"
            );
        }
        Ok(result)
    }

    /// Third stage: renders `result` into the sink. Returns the number of
    /// annotations shown.
    ///
    /// Only valid on the UI thread. Results of a pass older than the last one
    /// applied to the editor are dropped, as are results for closed editors.
    pub fn apply(&self, result: AnnotationResult) -> LspResult<usize> {
        if !is_ui_thread() {
            return Err(LspError::NotOnUiThread);
        }

        let editor = result.editor;
        if !self.workbench.is_open(editor) {
            tracing::debug!(%editor, pass = result.pass, "editor closed, dropping result");
            return Ok(0);
        }

        {
            let mut latest = self.applied.entry(editor).or_insert(0);
            if *latest > result.pass {
                tracing::debug!(%editor, pass = result.pass, latest = *latest, "superseded pass dropped");
                return Ok(0);
            }
            *latest = result.pass;
        }

        let holder = render(result, &self.markers);
        let count = holder.len();
        self.sink.apply(editor, holder.into_annotations());
        self.workbench
            .events()
            .emit(EditorEvent::AnnotationsApplied { editor, count });

        tracing::debug!(%editor, count, "annotations applied");
        Ok(count)
    }

    /// Hands `result` to the UI thread for [`apply`](Self::apply).
    pub fn schedule_apply(self: &Arc<Self>, result: AnnotationResult) {
        let this = Arc::clone(self);
        self.ui.invoke_later(Box::new(move || {
            if let Err(e) = this.apply(result) {
                tracing::warn!("failed to apply annotations: {}", e);
            }
        }));
    }

    /// Runs a full pass for `editor`.
    pub async fn annotate(self: &Arc<Self>, editor: EditorId) -> LspResult<()> {
        let Some(info) = self.collect(editor) else {
            return Ok(());
        };
        let result = self.resolve(info).await?;
        self.schedule_apply(result);
        Ok(())
    }

    /// Runs a pass in the background.
    ///
    /// Needs a tokio runtime; without one the pass is skipped.
    pub fn spawn_annotate(self: &Arc<Self>, editor: EditorId) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(%editor, "cannot start annotation pass: {}", e);
                return None;
            }
        };

        let this = Arc::clone(self);
        Some(handle.spawn(async move {
            if let Err(e) = this.annotate(editor).await {
                tracing::warn!(%editor, "annotation pass failed: {}", e);
            }
        }))
    }

    /// Handles `textDocument/publishDiagnostics` from `server`.
    ///
    /// Replaces that server's markers in every editor of the document and
    /// returns those editors. Safe to call from any thread.
    pub fn on_publish_diagnostics(
        self: &Arc<Self>,
        server: ServerId,
        params: PublishDiagnosticsParams,
    ) -> Vec<EditorId> {
        let editors = self.workbench.editors_for(&params.uri);
        tracing::debug!(
            %server,
            uri = params.uri.as_str(),
            diagnostics = params.diagnostics.len(),
            editors = editors.len(),
            "diagnostics published"
        );

        for &editor in &editors {
            match self.workbench.document_for(editor) {
                Ok(document) => {
                    self.markers
                        .replace_markers(editor, &server, &document, &params.diagnostics);
                }
                Err(e) => tracing::warn!(%editor, "skipping closed editor: {}", e),
            }
        }

        self.workbench.events().emit(EditorEvent::DiagnosticsPublished {
            uri: params.uri.as_str().to_string(),
            server: server.to_string(),
        });

        if self.config.render_on_publish {
            for &editor in &editors {
                self.spawn_annotate(editor);
            }
        }
        editors
    }

    /// Drops the markers and annotations of a closed editor.
    pub fn on_editor_closed(&self, editor: EditorId) {
        self.markers.clear_editor(editor);
        self.applied.remove(&editor);

        let sink = Arc::clone(&self.sink);
        self.ui.invoke_later(Box::new(move || sink.clear(editor)));
        tracing::debug!(%editor, "editor state released");
    }

    /// Follows the workbench's editor events: a pass on open, teardown on
    /// close.
    ///
    /// The loop ends when the event bus closes or the annotator is dropped.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = EventHandler::new(self.workbench.events().subscribe());
        let this: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(annotator) = this.upgrade() else {
                    break;
                };
                match event {
                    EditorEvent::EditorOpened(editor) => {
                        annotator.spawn_annotate(editor);
                    }
                    EditorEvent::EditorClosed(editor) => annotator.on_editor_closed(editor),
                    // Marker spans stay as published until the server republishes
                    EditorEvent::DocumentChanged(id) => {
                        let Ok(document) = annotator.workbench.document(id) else {
                            continue;
                        };
                        for editor in annotator.workbench.editors_for(document.uri()) {
                            annotator.spawn_annotate(editor);
                        }
                    }
                    _ => {}
                }
            }
            tracing::debug!("annotator event loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, LanguageClient};
    use crate::render::AnnotationStore;
    use crate::ui::{self, UiThread};
    use async_trait::async_trait;
    use liberty_core::{Config, Document, Workspace};
    use lsp_types::{
        CodeAction, CodeActionOrCommand, CodeActionParams, CodeActionProviderCapability,
        CodeActionResponse, Diagnostic, DiagnosticSeverity, Position, Range, ServerCapabilities,
    };
    use std::path::PathBuf;

    struct OneFix;

    #[async_trait]
    impl LanguageClient for OneFix {
        async fn code_action(&self, params: CodeActionParams) -> LspResult<Option<CodeActionResponse>> {
            Ok(Some(vec![CodeActionOrCommand::CodeAction(CodeAction {
                title: format!("Fix {}", params.context.diagnostics[0].message),
                ..CodeAction::default()
            })]))
        }
    }

    struct Harness {
        annotator: Arc<CodeActionAnnotator>,
        sink: Arc<AnnotationStore>,
        ui: UiThread,
        editor: EditorId,
    }

    fn harness(render_on_publish: bool) -> Harness {
        let workspace = Workspace::with_root(PathBuf::from("/demo"));
        let workbench = Arc::new(Workbench::new(workspace.clone()));
        let pool = Arc::new(ConnectionPool::new(workspace, &Config::default()));
        pool.register(Connection::new(
            ServerId::new("lsp4mp"),
            ServerCapabilities {
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                ..ServerCapabilities::default()
            },
            Arc::new(OneFix),
        ));

        let editor = workbench.open(Document::new(
            "file:///demo/src/Greeting.java".parse().unwrap(),
            "public class Greeting { String name; }",
        ));

        let (handle, ui) = ui::channel();
        let sink = Arc::new(AnnotationStore::new());
        let config = AnnotatorConfig {
            render_on_publish,
            ..AnnotatorConfig::default()
        };
        let annotator = Arc::new(CodeActionAnnotator::new(
            workbench,
            pool,
            Arc::new(handle),
            sink.clone(),
            config,
        ));

        Harness {
            annotator,
            sink,
            ui,
            editor,
        }
    }

    fn publish(messages: &[&str]) -> PublishDiagnosticsParams {
        let diagnostics = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Diagnostic {
                severity: Some(DiagnosticSeverity::WARNING),
                ..Diagnostic::new_simple(
                    Range::new(Position::new(0, i as u32), Position::new(0, i as u32 + 2)),
                    m.to_string(),
                )
            })
            .collect();
        PublishDiagnosticsParams::new("file:///demo/src/Greeting.java".parse().unwrap(), diagnostics, None)
    }

    #[tokio::test]
    async fn test_full_pass() {
        let mut h = harness(false);
        let editors = h
            .annotator
            .on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["a", "b"]));
        assert_eq!(editors, vec![h.editor]);

        h.annotator.annotate(h.editor).await.unwrap();
        assert!(h.sink.annotations(h.editor).is_empty());

        assert_eq!(h.ui.run_pending(), 1);
        let annotations = h.sink.annotations(h.editor);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].fixes[0].title, "Fix a");
        assert_eq!(annotations[1].fixes[0].title, "Fix b");
    }

    #[tokio::test]
    async fn test_apply_requires_ui_thread() {
        let h = harness(false);
        let info = h.annotator.collect(h.editor).unwrap();
        let result = h.annotator.resolve(info).await.unwrap();

        assert!(matches!(h.annotator.apply(result), Err(LspError::NotOnUiThread)));
    }

    #[tokio::test]
    async fn test_older_pass_does_not_overwrite_newer() {
        let mut h = harness(false);
        let annotator = h.annotator.clone();
        annotator.on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["old"]));
        let older = annotator.collect(h.editor).unwrap();
        annotator.on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["new", "newer"]));
        let newer = annotator.collect(h.editor).unwrap();

        let older = annotator.resolve(older).await.unwrap();
        let newer = annotator.resolve(newer).await.unwrap();
        annotator.schedule_apply(newer);
        annotator.schedule_apply(older);
        assert_eq!(h.ui.run_pending(), 2);

        let annotations = h.sink.annotations(h.editor);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].message, "new");
    }

    #[tokio::test]
    async fn test_publish_triggers_render() {
        let mut h = harness(true);
        h.annotator
            .on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["a"]));

        for _ in 0..100 {
            if h.ui.run_pending() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.sink.annotations(h.editor).len(), 1);
    }

    #[tokio::test]
    async fn test_edit_starts_a_new_pass() {
        let mut h = harness(false);
        h.annotator
            .on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["a"]));
        assert!(!h.sink.contains(h.editor));

        let events = h.annotator.spawn_event_loop();
        tokio::task::yield_now().await;
        let workbench = h.annotator.workbench();
        let document = workbench
            .find_by_uri(&"file:///demo/src/Greeting.java".parse().unwrap())
            .unwrap();
        workbench.edit(document, 0..6, "final").unwrap();

        for _ in 0..100 {
            if h.ui.run_pending() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.sink.annotations(h.editor).len(), 1);
        events.abort();
    }

    #[tokio::test]
    async fn test_close_releases_editor_state() {
        let mut h = harness(false);
        h.annotator
            .on_publish_diagnostics(ServerId::new("lsp4mp"), publish(&["a"]));
        h.annotator.annotate(h.editor).await.unwrap();
        h.ui.run_pending();
        assert!(h.sink.contains(h.editor));

        let events = h.annotator.spawn_event_loop();
        tokio::task::yield_now().await;
        h.annotator.workbench().close(h.editor).unwrap();

        for _ in 0..100 {
            if !h.annotator.markers().is_empty() {
                tokio::task::yield_now().await;
            }
        }
        assert!(h.annotator.markers().is_empty());
        h.ui.run_pending();
        assert!(!h.sink.contains(h.editor));
        events.abort();
    }

    #[tokio::test]
    async fn test_unknown_editor_collects_nothing() {
        let h = harness(false);
        assert!(h.annotator.collect(EditorId::new()).is_none());
    }
}
