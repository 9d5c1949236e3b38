use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of an authentication scheme (e.g. "Bearer", "Microsoft").
///
/// Equality is ordinal: two names are equal only if their bytes are equal.
/// No case folding or normalization is ever applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeName(String);

impl SchemeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SchemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SchemeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for SchemeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SchemeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Whether a handler takes part in pipeline-wide events by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMode {
    /// Authenticates every request and answers unnamed challenges and sign-outs
    #[default]
    Active,
    /// Only acts when its scheme is named explicitly
    Passive,
}
