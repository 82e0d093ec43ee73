//! Bridge configuration.
//!
//! Loaded from `<config dir>/liberty-tools/config.toml`. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names:
//!
//! ```toml
//! [annotator]
//! code_action_timeout_ms = 5000
//! render_on_publish = false
//!
//! [servers.lsp4mp]
//! languages = ["java", "properties", "microprofile-properties"]
//! command = "java"
//! args = ["-jar", "org.eclipse.lsp4mp.ls-uber.jar"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code-action annotation settings
    pub annotator: AnnotatorConfig,

    /// Language server definitions, keyed by server id
    pub servers: BTreeMap<String, ServerConfig>,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("liberty-tools").join("config.toml"))
    }

    /// Returns the definition of a server.
    pub fn server(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.get(id)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(
            "lsp4mp".to_string(),
            ServerConfig::for_languages(&["java", "properties", "microprofile-properties"]),
        );
        servers.insert(
            "lsp4jakarta".to_string(),
            ServerConfig::for_languages(&["java"]),
        );
        servers.insert(
            "liberty-ls".to_string(),
            ServerConfig::for_languages(&["serverenv", "bootstrap", "xml"]),
        );

        Self {
            annotator: AnnotatorConfig::default(),
            servers,
        }
    }
}

/// Code-action annotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Upper bound on waiting for code-action replies, in milliseconds
    pub code_action_timeout_ms: u64,

    /// Run a render pass as soon as a server publishes diagnostics
    pub render_on_publish: bool,
}

impl AnnotatorConfig {
    /// Returns the join deadline.
    pub fn code_action_timeout(&self) -> Duration {
        Duration::from_millis(self.code_action_timeout_ms)
    }
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            code_action_timeout_ms: 10_000,
            render_on_publish: true,
        }
    }
}

/// Definition of one language server.
///
/// Launching the process is the host's job; the bridge only uses the
/// language list to decide which documents a server applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Language ids this server handles (empty = every document)
    pub languages: Vec<String>,

    /// Launch command
    pub command: Option<String>,

    /// Launch arguments
    pub args: Vec<String>,
}

impl ServerConfig {
    /// Definition limited to a set of languages.
    pub fn for_languages(languages: &[&str]) -> Self {
        Self {
            languages: languages.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Returns true if the server applies to a document language.
    pub fn applies_to(&self, language: Option<&str>) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        language.is_some_and(|lang| self.languages.iter().any(|l| l == lang))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.annotator.code_action_timeout(), Duration::from_secs(10));
        assert!(config.annotator.render_on_publish);
        assert!(config.server("lsp4mp").unwrap().applies_to(Some("java")));
        assert!(!config.server("liberty-ls").unwrap().applies_to(Some("java")));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [annotator]
            code_action_timeout_ms = 250

            [servers.custom]
            languages = []
            "#,
        )
        .unwrap();

        assert_eq!(config.annotator.code_action_timeout(), Duration::from_millis(250));
        assert!(config.annotator.render_on_publish);
        // A servers table replaces the default definitions wholesale
        assert_eq!(config.servers.len(), 1);
        assert!(config.server("custom").unwrap().applies_to(None));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[annotator]\nrender_on_publish = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.annotator.render_on_publish);

        std::fs::write(&path, "[annotator\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }
}
