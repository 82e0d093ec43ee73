//! Server capability predicates.
//!
//! `codeActionProvider` arrives as `bool | CodeActionOptions | absent`. It is
//! folded once, when the connection is created, into [`CodeActionSupport`];
//! nothing downstream inspects the raw union again.

use lsp_types::{CodeActionOptions, CodeActionProviderCapability, ServerCapabilities};

/// Whether a server answers `textDocument/codeAction`.
#[derive(Debug, Clone, Default)]
pub enum CodeActionSupport {
    /// `false` or not advertised
    #[default]
    Unsupported,
    /// `true`
    Supported,
    /// Structured options (kinds, resolve support)
    SupportedWithOptions(CodeActionOptions),
}

impl CodeActionSupport {
    /// Reads the capability out of a server's initialize result.
    pub fn from_capabilities(capabilities: &ServerCapabilities) -> Self {
        match &capabilities.code_action_provider {
            Some(CodeActionProviderCapability::Simple(true)) => Self::Supported,
            Some(CodeActionProviderCapability::Simple(false)) | None => Self::Unsupported,
            Some(CodeActionProviderCapability::Options(options)) => {
                Self::SupportedWithOptions(options.clone())
            }
        }
    }

    /// The single predicate the dispatcher consults.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Returns the structured options, if the server sent any.
    pub fn options(&self) -> Option<&CodeActionOptions> {
        match self {
            Self::SupportedWithOptions(options) => Some(options),
            _ => None,
        }
    }
}
