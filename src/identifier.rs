//! Component identifiers
//!
//! A component is named either by a simple name (`HelloPanel`) or by a
//! qualified name (`com.acme.panels.HelloPanel`). Identifiers are validated
//! once, on construction, so everything downstream can rely on them being
//! well-formed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Separator between the qualifier segments and the simple name
pub const QUALIFIER_SEPARATOR: char = '.';

/// Validated component identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    /// Parse and validate an identifier.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` if the identifier is empty, begins or ends with the
    /// separator, has an empty segment, or contains characters outside
    /// alphanumerics, `_`, `$` and `-`.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(CompileError::invalid_identifier(raw, "identifier is empty"));
        }
        if raw.starts_with(QUALIFIER_SEPARATOR) {
            return Err(CompileError::invalid_identifier(
                raw,
                "begins with a qualifier separator",
            ));
        }
        if raw.ends_with(QUALIFIER_SEPARATOR) {
            return Err(CompileError::invalid_identifier(
                raw,
                "ends with a qualifier separator",
            ));
        }

        for segment in raw.split(QUALIFIER_SEPARATOR) {
            if segment.is_empty() {
                return Err(CompileError::invalid_identifier(raw, "contains an empty segment"));
            }
            if let Some(bad) = segment.chars().find(|c| !is_identifier_char(*c)) {
                return Err(CompileError::invalid_identifier(
                    raw.clone(),
                    format!("illegal character {bad:?}"),
                ));
            }
        }

        Ok(Self(raw))
    }

    /// Identifier from a constant known to be well-formed
    pub(crate) fn from_static(raw: &'static str) -> Self {
        debug_assert!(Self::parse(raw).is_ok(), "malformed constant identifier {raw}");
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment of the identifier (the type name)
    pub fn simple_name(&self) -> &str {
        match self.0.rfind(QUALIFIER_SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Everything before the final segment, if the identifier is qualified
    pub fn qualifier(&self) -> Option<&str> {
        self.0.rfind(QUALIFIER_SEPARATOR).map(|idx| &self.0[..idx])
    }

    #[inline]
    pub fn is_qualified(&self) -> bool {
        self.qualifier().is_some()
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-')
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ComponentId {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = CompileError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
