//! A [`LanguageClient`] that answers from a recorded script.
//!
//! Used by the driver binary and the integration tests to stand in for a
//! real server. A script looks like:
//!
//! ```json
//! {
//!   "code_actions": true,
//!   "latency_ms": 5,
//!   "rules": [
//!     { "code": "MissingPath", "actions": [{ "title": "Insert @Path", "kind": "quickfix" }] },
//!     { "message": "deprecated", "fail": true },
//!     { "message": "slow", "hang": true }
//!   ]
//! }
//! ```
//!
//! The first rule whose `code` equals the diagnostic code, or whose
//! `message` occurs in the diagnostic message, answers the request. No
//! matching rule means no actions.

use async_trait::async_trait;
use lsp_types::{
    CodeActionOrCommand, CodeActionParams, CodeActionProviderCapability, CodeActionResponse,
    Diagnostic, NumberOrString, ServerCapabilities,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::connection::LanguageClient;
use crate::{LspError, LspResult};

/// A recorded server session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    /// Whether the server advertises `codeActionProvider`
    pub code_actions: bool,
    /// Delay applied to every answer
    pub latency_ms: u64,
    pub rules: Vec<ReplayRule>,
}

impl Default for ReplayScript {
    fn default() -> Self {
        Self {
            code_actions: true,
            latency_ms: 0,
            rules: Vec::new(),
        }
    }
}

/// One scripted answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayRule {
    /// Diagnostic code to match
    pub code: Option<String>,
    /// Substring of the diagnostic message to match
    pub message: Option<String>,
    pub actions: Vec<CodeActionOrCommand>,
    /// Answer with an error response
    pub fail: bool,
    /// Never answer
    pub hang: bool,
    /// Extra delay for this rule
    pub latency_ms: u64,
}

impl ReplayRule {
    fn matches(&self, diagnostic: &Diagnostic) -> bool {
        let code = match (&self.code, &diagnostic.code) {
            (Some(expected), Some(NumberOrString::String(code))) => expected == code,
            (Some(expected), Some(NumberOrString::Number(code))) => *expected == code.to_string(),
            _ => false,
        };
        let message = self
            .message
            .as_deref()
            .is_some_and(|needle| diagnostic.message.contains(needle));
        code || message
    }
}

impl ReplayScript {
    /// Parses a script.
    pub fn from_json(json: &str) -> LspResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a script from disk.
    pub fn from_file(path: impl AsRef<Path>) -> LspResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Capabilities the scripted server reports at initialization.
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            code_action_provider: Some(CodeActionProviderCapability::Simple(self.code_actions)),
            ..ServerCapabilities::default()
        }
    }
}

/// Client answering `textDocument/codeAction` from a [`ReplayScript`].
#[derive(Debug)]
pub struct ReplayClient {
    script: ReplayScript,
    requests: AtomicUsize,
}

impl ReplayClient {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn script(&self) -> &ReplayScript {
        &self.script
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageClient for ReplayClient {
    async fn code_action(&self, params: CodeActionParams) -> LspResult<Option<CodeActionResponse>> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let rule = params
            .context
            .diagnostics
            .iter()
            .find_map(|d| self.script.rules.iter().find(|rule| rule.matches(d)));

        let latency = self.script.latency_ms + rule.map_or(0, |r| r.latency_ms);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let Some(rule) = rule else {
            return Ok(None);
        };
        if rule.hang {
            std::future::pending::<()>().await;
        }
        if rule.fail {
            return Err(LspError::ServerError {
                code: -32603,
                message: "scripted failure".to_string(),
            });
        }
        Ok(Some(rule.actions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::code_action_params;
    use lsp_types::{Position, Range};

    const SCRIPT: &str = r#"{
        "rules": [
            { "code": "MissingPath", "actions": [{ "title": "Insert @Path", "kind": "quickfix" }] },
            { "code": "42", "actions": [{ "title": "Numbered", "command": "liberty.fix" }] },
            { "message": "deprecated", "fail": true }
        ]
    }"#;

    fn params(code: Option<NumberOrString>, message: &str) -> CodeActionParams {
        let diagnostic = Diagnostic {
            code,
            ..Diagnostic::new_simple(
                Range::new(Position::new(0, 0), Position::new(0, 4)),
                message.to_string(),
            )
        };
        code_action_params(&"file:///demo/Greeting.java".parse().unwrap(), &diagnostic)
    }

    #[test]
    fn test_script_defaults() {
        let script = ReplayScript::from_json("{}").unwrap();
        assert!(script.code_actions);
        assert!(script.rules.is_empty());
        assert!(matches!(
            script.capabilities().code_action_provider,
            Some(CodeActionProviderCapability::Simple(true))
        ));
    }

    #[test]
    fn test_bad_script_is_an_error() {
        assert!(matches!(ReplayScript::from_json("{ rules"), Err(LspError::Json(_))));
    }

    #[tokio::test]
    async fn test_answers_by_code_and_message() {
        let client = ReplayClient::new(ReplayScript::from_json(SCRIPT).unwrap());

        let by_code = client
            .code_action(params(Some(NumberOrString::String("MissingPath".into())), "x"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.len(), 1);
        assert!(matches!(&by_code[0], CodeActionOrCommand::CodeAction(a) if a.title == "Insert @Path"));

        let by_number = client
            .code_action(params(Some(NumberOrString::Number(42)), "x"))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(&by_number[0], CodeActionOrCommand::Command(c) if c.command == "liberty.fix"));

        let failed = client.code_action(params(None, "API is deprecated")).await;
        assert!(matches!(failed, Err(LspError::ServerError { code: -32603, .. })));

        let unmatched = client.code_action(params(None, "other")).await.unwrap();
        assert!(unmatched.is_none());

        assert_eq!(client.requests(), 4);
    }
}
