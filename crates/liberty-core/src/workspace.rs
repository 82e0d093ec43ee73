//! Workspace (project folder) resolution.
//!
//! Language servers refer to files by `file://` URI. Before a document can be
//! matched against server connections it has to map back to a resource inside
//! the project; URIs that do not (other schemes, files outside the root) are a
//! resolution error the caller is expected to log and skip.

use lsp_types::Uri;
use std::path::{Path, PathBuf};
use url::Url;

use crate::{CoreError, CoreResult};

/// Builds a percent-encoded `file://` URI for an absolute path.
pub fn file_uri(path: impl AsRef<Path>) -> CoreResult<Uri> {
    let path = path.as_ref();
    let url = Url::from_file_path(path)
        .map_err(|_| CoreError::InvalidUri(path.display().to_string()))?;
    url.as_str()
        .parse()
        .map_err(|_| CoreError::InvalidUri(url.to_string()))
}

/// Represents a workspace (project folder).
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the workspace
    root: PathBuf,

    /// Workspace name
    name: String,
}

impl Workspace {
    /// Opens a workspace from an existing directory.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let root = path.as_ref().canonicalize()?;

        if !root.is_dir() {
            return Err(CoreError::FileNotFound(root.display().to_string()));
        }

        Ok(Self::with_root(root))
    }

    /// Creates a workspace rooted at `root` without touching the filesystem.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Workspace")
            .to_string();
        Self { root, name }
    }

    /// Returns the workspace root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the workspace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a path relative to the workspace root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Maps a document URI to the project resource it names.
    pub fn resource_for(&self, uri: &Uri) -> CoreResult<PathBuf> {
        let raw = uri.as_str();
        let path = Url::parse(raw)
            .ok()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| CoreError::InvalidUri(raw.to_string()))?;

        if !path.starts_with(&self.root) {
            return Err(CoreError::OutsideWorkspace(raw.to_string()));
        }
        Ok(path)
    }

    /// Returns the path relative to the workspace root.
    pub fn relative_path<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_for_inside_root() {
        let workspace = Workspace::with_root("/projects/demo");
        let uri = file_uri("/projects/demo/src/main/liberty/config/server.env").unwrap();
        let path = workspace.resource_for(&uri).unwrap();
        assert_eq!(
            workspace.relative_path(&path),
            Some(Path::new("src/main/liberty/config/server.env"))
        );
    }

    #[test]
    fn test_resource_for_rejects_foreign_uris() {
        let workspace = Workspace::with_root("/projects/demo");

        let outside = file_uri("/elsewhere/Foo.java").unwrap();
        assert!(matches!(
            workspace.resource_for(&outside),
            Err(CoreError::OutsideWorkspace(_))
        ));

        let remote: Uri = "jdt://contents/rt.jar/java.lang/String.class".parse().unwrap();
        assert!(matches!(
            workspace.resource_for(&remote),
            Err(CoreError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_file_uri_escapes_spaces() {
        let uri = file_uri("/projects/my app/Foo.java").unwrap();
        assert_eq!(uri.as_str(), "file:///projects/my%20app/Foo.java");

        let workspace = Workspace::with_root("/projects/my app");
        assert!(workspace.resource_for(&uri).is_ok());
    }

    #[test]
    fn test_resource_for_decodes_percent_escapes() {
        let workspace = Workspace::with_root("/projects/café");
        let uri: Uri = "file:///projects/caf%C3%A9/src/Greeting.java".parse().unwrap();
        assert_eq!(
            workspace.resource_for(&uri).unwrap(),
            PathBuf::from("/projects/café/src/Greeting.java")
        );

        let workspace = Workspace::with_root("/projects/a#b");
        let uri: Uri = "file:///projects/a%23b/Greeting.java".parse().unwrap();
        assert_eq!(
            workspace.relative_path(&workspace.resource_for(&uri).unwrap()),
            Some(Path::new("Greeting.java"))
        );
    }

    #[test]
    fn test_file_uri_encodes_reserved_and_non_ascii() {
        let uri = file_uri("/projects/café/Greeting.java").unwrap();
        assert_eq!(uri.as_str(), "file:///projects/caf%C3%A9/Greeting.java");

        let uri = file_uri("/projects/a#b/Greeting.java").unwrap();
        assert_eq!(uri.as_str(), "file:///projects/a%23b/Greeting.java");
        assert!(!uri.as_str().contains('#'));

        let workspace = Workspace::with_root("/projects/a#b");
        assert!(workspace.resource_for(&uri).is_ok());

        assert!(matches!(file_uri("relative/Greeting.java"), Err(CoreError::InvalidUri(_))));
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        assert!(workspace.root().is_absolute());
        assert!(workspace.resolve("pom.xml").ends_with("pom.xml"));

        let file = dir.path().join("pom.xml");
        std::fs::write(&file, "<project/>").unwrap();
        assert!(Workspace::open(&file).is_err());
    }
}
