//! Protocol types and definitions for MCP roots
//!
//! Roots are the base locations a client authorizes a server to work in.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Represents a root directory or file that the server can operate on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Root {
    /// The URI identifying the root. This *must* start with file:// for now.
    pub uri: String,
    /// An optional name for the root, for display purposes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    /// Create a root after checking the URI is a valid `file://` URL
    pub fn new(uri: impl Into<String>) -> Result<Self, Error> {
        let uri = uri.into();
        let url = url::Url::parse(&uri)?;
        if url.scheme() != "file" {
            return Err(Error::InvalidParams(format!("Root URI must use the file scheme: {}", uri)));
        }
        Ok(Self { uri, name: None })
    }

    /// Create a root for a local directory
    pub fn from_directory(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let url = url::Url::from_directory_path(path)
            .map_err(|_| Error::InvalidParams(format!("Not an absolute directory path: {}", path.display())))?;
        Ok(Self {
            uri: url.to_string(),
            name: None,
        })
    }

    /// The local path this root points at
    pub fn to_path(&self) -> Result<std::path::PathBuf, Error> {
        url::Url::parse(&self.uri)?
            .to_file_path()
            .map_err(|_| Error::InvalidParams(format!("Root is not a local path: {}", self.uri)))
    }

    /// Set a human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The client's response to a roots/list request from the server.
///
/// An empty list means no access was granted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRootsResult {
    /// The available roots
    pub roots: Vec<Root>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_requires_file_scheme() {
        let root = Root::new("file:///home/user/project").unwrap().with_name("project");
        assert_eq!(root.name.as_deref(), Some("project"));
        assert!(Root::new("https://example.com").is_err());
        assert!(Root::new("not a uri").is_err());
    }

    #[test]
    fn test_directory_roundtrip() {
        let dir = std::env::temp_dir();
        let root = Root::from_directory(&dir).unwrap();
        assert!(root.uri.starts_with("file://"));
        assert!(root.uri.ends_with('/'));
        assert_eq!(root.to_path().unwrap(), dir);
        assert!(Root::from_directory("relative/path").is_err());
    }
}
