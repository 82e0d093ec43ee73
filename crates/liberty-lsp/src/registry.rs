//! Which connections apply to a document.

use dashmap::DashMap;
use liberty_core::{Config, Document, ServerConfig, Workspace};
use lsp_types::ServerCapabilities;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId, ServerId};

/// Pool of live connections plus the server definitions they came from.
///
/// The pool owns the sessions; callers only ever get `Arc` clones.
pub struct ConnectionPool {
    workspace: Workspace,
    definitions: BTreeMap<ServerId, ServerConfig>,
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionPool {
    /// Creates a pool using the server definitions from the config.
    pub fn new(workspace: Workspace, config: &Config) -> Self {
        let definitions = config
            .servers
            .iter()
            .map(|(id, server)| (ServerId::new(id), server.clone()))
            .collect();

        Self {
            workspace,
            definitions,
            connections: DashMap::new(),
        }
    }

    /// Adds a live connection.
    pub fn register(&self, connection: Connection) -> Arc<Connection> {
        let connection = Arc::new(connection);
        tracing::info!(
            server = %connection.server_id(),
            connection = %connection.id(),
            code_actions = connection.code_actions().is_supported(),
            "connection registered"
        );
        self.connections.insert(connection.id(), Arc::clone(&connection));
        connection
    }

    /// Removes a connection. In-flight requests keep their own handle.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Returns a connection by id.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connection is live.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns the connections attached to a document whose capabilities
    /// satisfy `predicate`.
    ///
    /// A document that does not map to a workspace resource has no
    /// connections; the failure is logged, not returned.
    pub fn resolve<P>(&self, document: &Document, predicate: P) -> Vec<Arc<Connection>>
    where
        P: Fn(&ServerCapabilities) -> bool,
    {
        if let Err(e) = self.workspace.resource_for(document.uri()) {
            tracing::warn!(uri = document.uri().as_str(), "cannot resolve document: {}", e);
            return Vec::new();
        }

        let mut connections: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .filter(|entry| self.applies_to(entry.value(), document))
            .filter(|entry| predicate(entry.value().capabilities()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        connections.sort_by(|a, b| {
            a.server_id()
                .cmp(b.server_id())
                .then_with(|| a.id().cmp(&b.id()))
        });
        connections
    }

    fn applies_to(&self, connection: &Connection, document: &Document) -> bool {
        match self.definitions.get(connection.server_id()) {
            Some(definition) => definition.applies_to(document.language()),
            // Connections registered without a definition are not filtered
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LspResult;
    use crate::connection::LanguageClient;
    use async_trait::async_trait;
    use lsp_types::{CodeActionParams, CodeActionResponse};

    struct Silent;

    #[async_trait]
    impl LanguageClient for Silent {
        async fn code_action(&self, _: CodeActionParams) -> LspResult<Option<CodeActionResponse>> {
            Ok(None)
        }
    }

    fn pool() -> ConnectionPool {
        ConnectionPool::new(Workspace::with_root("/demo"), &Config::default())
    }

    fn connect(pool: &ConnectionPool, server: &str) -> Arc<Connection> {
        pool.register(Connection::new(
            ServerId::new(server),
            ServerCapabilities::default(),
            Arc::new(Silent),
        ))
    }

    fn doc(path: &str) -> Document {
        Document::new(format!("file://{path}").parse().unwrap(), "")
    }

    #[test]
    fn test_resolve_filters_by_language() {
        let pool = pool();
        let mp = connect(&pool, "lsp4mp");
        let jakarta = connect(&pool, "lsp4jakarta");
        let liberty = connect(&pool, "liberty-ls");

        let java: Vec<_> = pool
            .resolve(&doc("/demo/src/Greeting.java"), |_| true)
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(java.len(), 2);
        assert!(java.contains(&mp.id()) && java.contains(&jakarta.id()));

        let env = pool.resolve(&doc("/demo/src/main/liberty/config/server.env"), |_| true);
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].id(), liberty.id());
    }

    #[test]
    fn test_resolve_applies_predicate() {
        let pool = pool();
        connect(&pool, "lsp4mp");
        let none = pool.resolve(&doc("/demo/Greeting.java"), |caps| {
            caps.code_action_provider.is_some()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn test_unresolvable_document_has_no_connections() {
        let pool = pool();
        connect(&pool, "lsp4mp");
        assert!(pool.resolve(&doc("/elsewhere/Greeting.java"), |_| true).is_empty());
    }

    #[test]
    fn test_unknown_server_applies_everywhere() {
        let pool = pool();
        let custom = connect(&pool, "custom");
        let resolved = pool.resolve(&doc("/demo/notes.txt"), |_| true);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id(), custom.id());

        assert!(pool.unregister(custom.id()).is_some());
        assert!(pool.is_empty());
    }
}
