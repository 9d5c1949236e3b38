//! Events an application attaches to its response (as response extensions)
//! for the authentication pipeline to dispatch to matching handlers.

use crate::security::{Identity, SchemeName};
use axum::http::{HeaderMap, Uri};

/// Ask handlers to challenge a 401 response.
///
/// No schemes means "every active handler".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    pub schemes: Vec<SchemeName>,
    /// Where to send the user after a successful interactive login
    pub redirect_uri: Option<String>,
}

impl Challenge {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemeName>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
            redirect_uri: None,
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }
}

/// Hand freshly issued identities to the handlers of their schemes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignIn {
    pub identities: Vec<Identity>,
}

impl SignIn {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }
}

/// Ask handlers to forget the user.
///
/// No schemes means "every active handler".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOut {
    pub schemes: Vec<SchemeName>,
}

impl SignOut {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemeName>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
        }
    }
}

/// The parts of the original request that response-time hooks may need
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(uri: Uri, headers: HeaderMap) -> Self {
        Self { uri, headers }
    }
}
