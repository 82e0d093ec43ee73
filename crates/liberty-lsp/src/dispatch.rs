//! Fan-out of `textDocument/codeAction` requests.
//!
//! One request per (connection, marker), each carrying exactly the one
//! diagnostic its marker stands for, so every returned fix can be attributed
//! to the diagnostic it answers. Requests are spawned on the runtime and never
//! awaited here; the [`crate::join`] stage decides how long to wait.

use lsp_types::{
    CodeActionContext, CodeActionParams, Diagnostic, PartialResultParams, TextDocumentIdentifier,
    Uri, WorkDoneProgressParams,
};
use tokio::task::JoinHandle;

use crate::request::{ActionSlot, AnnotationInfo};

/// A spawned request and the slot its task writes to.
pub struct PendingRequest {
    pub(crate) slot: ActionSlot,
    pub(crate) handle: JoinHandle<()>,
}

/// Builds the params for one diagnostic.
pub fn code_action_params(uri: &Uri, diagnostic: &Diagnostic) -> CodeActionParams {
    CodeActionParams {
        text_document: TextDocumentIdentifier::new(uri.clone()),
        range: diagnostic.range,
        context: CodeActionContext {
            diagnostics: vec![diagnostic.clone()],
            only: None,
            trigger_kind: None,
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    }
}

/// Sends the requests of `info` and returns the spawned tasks.
///
/// Requests of connections without code-action support are resolved on the
/// spot with no actions; those connections are never contacted. Must be
/// called from within a tokio runtime.
pub fn dispatch(info: &AnnotationInfo) -> Vec<PendingRequest> {
    let uri = info.document.uri();
    let mut pending = Vec::with_capacity(info.request_count());

    for entry in &info.entries {
        let connection = &entry.connection;
        if !connection.code_actions().is_supported() {
            tracing::debug!(
                server = %connection.server_id(),
                connection = %connection.id(),
                markers = entry.requests.len(),
                "code actions unsupported, skipping"
            );
            for request in &entry.requests {
                request.resolve(Vec::new());
            }
            continue;
        }

        for request in &entry.requests {
            let params = code_action_params(uri, request.marker().diagnostic());
            let client = connection.client();
            let slot = request.slot();
            let connection_id = connection.id();

            let handle = tokio::spawn({
                let slot = slot.clone();
                async move {
                    let actions = match client.code_action(params).await {
                        Ok(actions) => actions.unwrap_or_default(),
                        Err(e) => {
                            tracing::warn!(connection = %connection_id, "code action request failed: {}", e);
                            Vec::new()
                        }
                    };
                    let _ = slot.set(actions);
                }
            });

            pending.push(PendingRequest { slot, handle });
        }
    }

    tracing::debug!(
        editor = %info.editor,
        pass = info.pass,
        sent = pending.len(),
        "code action requests dispatched"
    );
    pending
}
