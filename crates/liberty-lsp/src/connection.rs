//! Live language server sessions.
//!
//! The transport (process, stdio framing, JSON-RPC ids) belongs to whatever
//! client library the host uses. The pipeline only needs the
//! [`LanguageClient`] seam to send `textDocument/codeAction`.

use async_trait::async_trait;
use lsp_types::{CodeActionParams, CodeActionResponse, ServerCapabilities};
use std::sync::Arc;
use uuid::Uuid;

use crate::LspResult;
use crate::capability::CodeActionSupport;

/// Identifier of a server definition (`lsp4mp`, `lsp4jakarta`, ...).
///
/// Markers are keyed by this id, so every session started from the same
/// definition sees the same diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(Arc<str>);

impl ServerId {
    /// Creates a server id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new unique connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request side of an initialized server.
#[async_trait]
pub trait LanguageClient: Send + Sync {
    /// Sends `textDocument/codeAction`. A `null` result is `Ok(None)`.
    async fn code_action(&self, params: CodeActionParams) -> LspResult<Option<CodeActionResponse>>;
}

/// One live language server session.
pub struct Connection {
    id: ConnectionId,
    server_id: ServerId,
    capabilities: ServerCapabilities,
    code_actions: CodeActionSupport,
    client: Arc<dyn LanguageClient>,
}

impl Connection {
    /// Wraps an initialized session. Capabilities are static for its lifetime.
    pub fn new(
        server_id: ServerId,
        capabilities: ServerCapabilities,
        client: Arc<dyn LanguageClient>,
    ) -> Self {
        let code_actions = CodeActionSupport::from_capabilities(&capabilities);
        Self {
            id: ConnectionId::new(),
            server_id,
            capabilities,
            code_actions,
            client,
        }
    }

    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the server definition id.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Returns the capabilities negotiated at initialization.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Returns the folded code-action capability.
    pub fn code_actions(&self) -> &CodeActionSupport {
        &self.code_actions
    }

    /// Returns a handle for issuing requests.
    pub fn client(&self) -> Arc<dyn LanguageClient> {
        Arc::clone(&self.client)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("server_id", &self.server_id)
            .field("code_actions", &self.code_actions.is_supported())
            .finish()
    }
}
