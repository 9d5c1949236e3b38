pub mod api_key;
pub mod jwt;

pub use api_key::ApiKeyHandler;
pub use jwt::JwtBearerHandler;

use crate::error::Result;
use crate::pipeline::{Challenge, RequestHead};
use crate::security::{AuthenticationMode, Identity, SchemeName};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::response::Response;

/// Static per-handler registration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Scheme this handler answers to
    pub scheme: SchemeName,
    /// Whether the handler runs without being named
    pub mode: AuthenticationMode,
}

impl HandlerOptions {
    pub fn new(scheme: impl Into<SchemeName>, mode: AuthenticationMode) -> Self {
        Self {
            scheme: scheme.into(),
            mode,
        }
    }

    pub fn active(scheme: impl Into<SchemeName>) -> Self {
        Self::new(scheme, AuthenticationMode::Active)
    }

    pub fn passive(scheme: impl Into<SchemeName>) -> Self {
        Self::new(scheme, AuthenticationMode::Passive)
    }
}

/// One authentication scheme plugged into the pipeline.
///
/// `authenticate` returns `Ok(None)` when the request carries no credentials
/// for this scheme, and an error when it carries credentials that are bad.
/// The event hooks default to doing nothing.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    fn options(&self) -> &HandlerOptions;

    fn scheme(&self) -> &SchemeName {
        &self.options().scheme
    }

    fn mode(&self) -> AuthenticationMode {
        self.options().mode
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>>;

    /// Called on a 401 response when this handler matches the challenge
    async fn challenge(
        &self,
        _request: &RequestHead,
        _challenge: &Challenge,
        _response: &mut Response,
    ) -> Result<()> {
        Ok(())
    }

    /// Called with the sign-in identity addressed to this handler
    async fn sign_in(&self, _identity: &Identity, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// Called when this handler matches a sign-out
    async fn sign_out(&self, _response: &mut Response) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_options_constructors() {
        let active = HandlerOptions::active("Bearer");
        assert_eq!(active.scheme.as_str(), "Bearer");
        assert_eq!(active.mode, AuthenticationMode::Active);

        let passive = HandlerOptions::passive("Microsoft");
        assert_eq!(passive.mode, AuthenticationMode::Passive);
    }
}
