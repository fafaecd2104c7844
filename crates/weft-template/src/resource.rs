//! Template resources
//!
//! The tokenizer only needs two things from the outside world: a stable
//! identity usable as a cache key, and the markup bytes.

use std::fs;
use std::io;
use std::path::PathBuf;

/// A readable markup resource with a stable identity.
pub trait TemplateResource {
    /// Stable identity, used as the cache key and in diagnostics.
    fn identity(&self) -> &str;

    /// Read the full markup source.
    fn read(&self) -> io::Result<String>;
}

/// In-memory resource, used for tests and embedded templates.
#[derive(Debug, Clone)]
pub struct StringResource {
    identity: String,
    content: String,
}

impl StringResource {
    pub fn new(identity: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            content: content.into(),
        }
    }
}

impl TemplateResource for StringResource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn read(&self) -> io::Result<String> {
        Ok(self.content.clone())
    }
}

/// Filesystem-backed resource.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    identity: String,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = path.to_string_lossy().into_owned();
        Self { path, identity }
    }
}

impl TemplateResource for FileResource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }
}
