//! Error handling for the installer compiler
//!
//! Every failure of a compilation run is a [`CompileError`]. None of them are
//! recoverable within a run: the pipeline aborts on the first one and reports
//! it unchanged, with the component and/or archive path involved.

use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;

/// Main error type for the installer compiler
#[derive(Error, Debug)]
pub enum CompileError {
    /// Component identifier is empty or malformed
    #[error("Invalid component identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// No artifact exists for a component on the search path
    #[error("Component '{component}' not found (looked for {searched})")]
    ComponentNotFound { component: String, searched: String },

    /// A resolved source file or archive member could not be read
    #[error("Source not found for '{origin}': {path}")]
    SourceNotFound { origin: String, path: PathBuf },

    /// Two units tried to write the same archive entry
    #[error("Duplicate archive entry '{path}' from '{origin}' (already written by '{first_writer}')")]
    DuplicateEntry {
        path: String,
        origin: String,
        first_writer: String,
    },

    /// Entry path is not a valid archive-relative path
    #[error("Invalid archive entry path '{path}': {reason}")]
    InvalidEntryPath { path: String, reason: String },

    /// Installation descriptor could not be read or is invalid
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Compiler configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline stage transition was refused
    #[error("Compile transition error: {0}")]
    Transition(String),

    /// Archive open/write/close and other filesystem failures
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip container errors (search-path archives and the output archive)
    #[error("Archive error on {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Result type alias for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid entry path error
    pub fn invalid_entry_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntryPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a zip error with the archive it happened on
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "invalid-identifier",
            Self::ComponentNotFound { .. } => "component-not-found",
            Self::SourceNotFound { .. } => "source-not-found",
            Self::DuplicateEntry { .. } => "duplicate-entry",
            Self::InvalidEntryPath { .. } => "invalid-entry-path",
            Self::Descriptor(_) => "descriptor",
            Self::Config(_) => "config",
            Self::Transition(_) => "transition",
            Self::Io { .. } => "io",
            Self::Archive { .. } => "archive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::invalid_identifier(".Foo", "begins with a separator");
        assert_eq!(
            err.to_string(),
            "Invalid component identifier '.Foo': begins with a separator"
        );

        let err = CompileError::DuplicateEntry {
            path: "com/acme/A.class".to_string(),
            origin: "com.acme.B".to_string(),
            first_writer: "com.acme.A".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("com/acme/A.class"));
        assert!(msg.contains("com.acme.B"));
        assert!(msg.contains("com.acme.A"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CompileError::io("/tmp/out.jar", io_err);
        assert!(matches!(err, CompileError::Io { .. }));
        assert!(err.to_string().contains("/tmp/out.jar"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CompileError::config("x").kind(), "config");
        assert_eq!(
            CompileError::ComponentNotFound {
                component: "Foo".into(),
                searched: "a/Foo.class".into()
            }
            .kind(),
            "component-not-found"
        );
    }
}
