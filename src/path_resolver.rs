//! Component identifier → archive directory
//!
//! Pure naming convention, no I/O: the qualifier of an identifier is its
//! package directory inside the archive, and unqualified identifiers live in
//! the default panel package.
//!
//! | Identifier                  | Resolved path               |
//! |-----------------------------|-----------------------------|
//! | `com.test.sample.SomeClass` | `com/test/sample`           |
//! | `HelloPanel`                | `com/izforge/izpack/panels` |

use std::fmt;

use crate::error::{CompileError, Result};
use crate::identifier::{ComponentId, QUALIFIER_SEPARATOR};

/// Conventional location of unqualified panel classes
pub const DEFAULT_PANEL_PACKAGE: &str = "com/izforge/izpack/panels";

/// Slash-separated, archive-relative directory path.
///
/// Never empty, never starts or ends with `/`, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedPath(String);

impl ResolvedPath {
    /// Validate an already slash-separated directory path.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CompileError::invalid_entry_path(raw, "package path is empty"));
        }
        if raw.contains('\\') {
            return Err(CompileError::invalid_entry_path(raw, "backslash separator"));
        }
        if raw.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(CompileError::invalid_entry_path(
                raw,
                "empty or relative segment",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Archive entry path of `name` inside this directory
    pub fn entry(&self, name: &str) -> String {
        format!("{}/{}", self.0, name)
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ResolvedPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResolvedPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Path resolver carrying the package used for unqualified identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    default_package: ResolvedPath,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            default_package: ResolvedPath(DEFAULT_PANEL_PACKAGE.to_string()),
        }
    }
}

impl PathResolver {
    pub fn new(default_package: ResolvedPath) -> Self {
        Self { default_package }
    }

    pub fn default_package(&self) -> &ResolvedPath {
        &self.default_package
    }

    /// Resolve a raw identifier, validating it first.
    pub fn resolve(&self, identifier: &str) -> Result<ResolvedPath> {
        let id = ComponentId::parse(identifier)?;
        Ok(self.resolve_id(&id))
    }

    /// Resolve an already validated identifier.
    pub fn resolve_id(&self, id: &ComponentId) -> ResolvedPath {
        match id.qualifier() {
            Some(qualifier) => ResolvedPath(qualifier.replace(QUALIFIER_SEPARATOR, "/")),
            None => self.default_package.clone(),
        }
    }
}

/// Resolve the package path of `identifier` using the default panel package.
///
/// # Errors
///
/// `InvalidIdentifier` if the identifier is empty or malformed.
pub fn resolve_package_path(identifier: &str) -> Result<ResolvedPath> {
    PathResolver::default().resolve(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_identifier_drops_simple_name() {
        let path = resolve_package_path("com.test.sample.SomeClass").expect("valid");
        assert_eq!(path, "com/test/sample");
    }

    #[test]
    fn test_single_qualifier_segment() {
        let path = resolve_package_path("acme.Panel").expect("valid");
        assert_eq!(path, "acme");
    }

    #[test]
    fn test_unqualified_uses_default_package() {
        let path = resolve_package_path("UneClasse").expect("valid");
        assert_eq!(path, DEFAULT_PANEL_PACKAGE);
    }

    #[test]
    fn test_custom_default_package() {
        let resolver = PathResolver::new(ResolvedPath::parse("org/example/ui").expect("valid"));
        assert_eq!(resolver.resolve("HelloPanel").expect("valid"), "org/example/ui");
        assert_eq!(resolver.resolve("a.b.C").expect("valid"), "a/b");
    }

    #[test]
    fn test_malformed_identifier_is_rejected() {
        for raw in ["", ".Foo", "com.test."] {
            assert!(matches!(
                resolve_package_path(raw),
                Err(CompileError::InvalidIdentifier { .. })
            ));
        }
    }

    #[test]
    fn test_resolved_path_validation() {
        assert!(ResolvedPath::parse("com/acme").is_ok());
        for raw in ["", "/com", "com/", "com//acme", "com\\acme", "com/../etc"] {
            assert!(ResolvedPath::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_entry_join() {
        let path = resolve_package_path("com.acme.Foo").expect("valid");
        assert_eq!(path.entry("Foo.class"), "com/acme/Foo.class");
    }
}
