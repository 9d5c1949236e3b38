pub mod events;
pub mod middleware;

pub use events::{Challenge, RequestHead, SignIn, SignOut};
pub use middleware::{authentication_middleware, CurrentUser};

use crate::config::AuthenticationConfig;
use crate::error::{AuthError, Result};
use crate::handlers::{ApiKeyHandler, AuthenticationHandler, HandlerOptions, JwtBearerHandler};
use crate::metrics;
use crate::microsoft_account::{MicrosoftAccountHandler, MicrosoftAccountOptions};
use crate::secrets::SecretsProvider;
use crate::security::{
    add_user_identity, lookup_challenge, lookup_sign_in, lookup_sign_out, AuthenticationMode,
    Identity, PrincipalSlot, SchemeName,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collects handlers and named options, then builds an [`AuthenticationPipeline`]
#[derive(Default)]
pub struct AuthenticationBuilder {
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
    named_options: HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>,
}

impl AuthenticationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers run in registration order
    pub fn add_handler<H: AuthenticationHandler + 'static>(self, handler: H) -> Self {
        self.add_shared_handler(Arc::new(handler))
    }

    pub fn add_shared_handler(mut self, handler: Arc<dyn AuthenticationHandler>) -> Self {
        debug!(scheme = %handler.scheme(), mode = ?handler.mode(), "Registering authentication handler");
        self.handlers.push(handler);
        self
    }

    /// Configure the options instance of type `T` registered under `name`.
    /// Repeated calls for the same name stack on top of each other.
    pub fn configure_options<T, F>(mut self, name: &str, configure: F) -> Self
    where
        T: Default + Clone + Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let mut options = self.options::<T>(name);
        configure(&mut options);
        self.named_options
            .insert((TypeId::of::<T>(), name.to_string()), Box::new(options));
        self
    }

    /// The options of type `T` registered under `name`, or `T::default()`
    pub fn options<T>(&self, name: &str) -> T
    where
        T: Default + Clone + 'static,
    {
        self.named_options
            .get(&(TypeId::of::<T>(), name.to_string()))
            .and_then(|options| options.downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }

    /// Build handlers for every scheme in the configuration
    pub async fn from_config(
        config: &AuthenticationConfig,
        secrets: &dyn SecretsProvider,
    ) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::new();
        for scheme in &config.schemes {
            if let Some(jwt) = &scheme.jwt {
                let mode = scheme.mode.unwrap_or(AuthenticationMode::Active);
                let options = HandlerOptions::new(scheme.name.clone(), mode);
                builder = builder.add_handler(JwtBearerHandler::new(options, jwt)?);
            } else if let Some(api_key) = &scheme.api_key {
                let mode = scheme.mode.unwrap_or(AuthenticationMode::Active);
                let options = HandlerOptions::new(scheme.name.clone(), mode);
                builder = builder.add_handler(ApiKeyHandler::new(options, api_key).await?);
            } else if let Some(microsoft) = &scheme.microsoft_account {
                let options = MicrosoftAccountOptions::from_config(
                    &scheme.name,
                    scheme.mode,
                    microsoft,
                    secrets,
                )?;
                builder = builder.add_handler(MicrosoftAccountHandler::new(options)?);
            }
        }

        info!("Loaded {} authentication schemes", builder.handlers.len());
        Ok(builder)
    }

    /// Finish registration; scheme names must be non-empty and unique
    pub fn build(self) -> Result<AuthenticationPipeline> {
        let mut seen = HashSet::new();
        for handler in &self.handlers {
            if handler.scheme().is_empty() {
                return Err(AuthError::Config(
                    "Authentication handler registered without a scheme name".to_string(),
                ));
            }
            if !seen.insert(handler.scheme().clone()) {
                return Err(AuthError::DuplicateScheme(handler.scheme().to_string()));
            }
        }

        Ok(AuthenticationPipeline {
            handlers: self.handlers,
        })
    }
}

/// Registered handlers, run per request by [`authentication_middleware`]
#[derive(Clone)]
pub struct AuthenticationPipeline {
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
}

impl AuthenticationPipeline {
    pub fn builder() -> AuthenticationBuilder {
        AuthenticationBuilder::new()
    }

    pub fn handlers(&self) -> &[Arc<dyn AuthenticationHandler>] {
        &self.handlers
    }

    pub fn schemes(&self) -> Vec<&SchemeName> {
        self.handlers.iter().map(|h| h.scheme()).collect()
    }

    pub fn handler(&self, scheme: &SchemeName) -> Option<&Arc<dyn AuthenticationHandler>> {
        self.handlers.iter().find(|h| h.scheme() == scheme)
    }

    /// Run every active handler and compose each identity it yields onto
    /// `slot`. Failures are logged and skipped. Returns how many
    /// identities were added.
    pub async fn authenticate<S>(&self, headers: &HeaderMap, slot: &mut S) -> usize
    where
        S: PrincipalSlot + Send + ?Sized,
    {
        let mut added = 0;

        for handler in &self.handlers {
            if handler.mode() != AuthenticationMode::Active {
                continue;
            }

            match handler.authenticate(headers).await {
                Ok(Some(identity)) => {
                    debug!(scheme = %handler.scheme(), "Authentication successful");
                    metrics::record_auth_attempt(handler.scheme().as_str(), true);
                    add_user_identity(slot, identity);
                    added += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(scheme = %handler.scheme(), error = %e, "Authentication failed");
                    metrics::record_auth_attempt(handler.scheme().as_str(), false);
                }
            }
        }

        added
    }

    /// Authenticate with explicitly named schemes, passive ones included.
    /// Unlike [`Self::authenticate`], handler errors are returned.
    pub async fn authenticate_schemes(
        &self,
        headers: &HeaderMap,
        schemes: &[SchemeName],
    ) -> Result<Vec<Identity>> {
        let mut identities = Vec::new();

        for scheme in schemes {
            let handler = self
                .handler(scheme)
                .ok_or_else(|| AuthError::UnknownScheme(scheme.to_string()))?;

            match handler.authenticate(headers).await {
                Ok(Some(identity)) => {
                    metrics::record_auth_attempt(scheme.as_str(), true);
                    identities.push(identity);
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::record_auth_attempt(scheme.as_str(), false);
                    return Err(e);
                }
            }
        }

        Ok(identities)
    }

    /// Let every matching handler challenge the response
    pub async fn challenge(
        &self,
        request: &RequestHead,
        challenge: &Challenge,
        response: &mut Response,
    ) -> Result<()> {
        for handler in &self.handlers {
            if lookup_challenge(&challenge.schemes, handler.scheme(), handler.mode()) {
                debug!(scheme = %handler.scheme(), "Applying challenge");
                metrics::record_challenge(handler.scheme().as_str());
                handler.challenge(request, challenge, response).await?;
            }
        }
        Ok(())
    }

    /// Give each handler the sign-in identity addressed to its scheme
    pub async fn sign_in(&self, sign_in: &SignIn, response: &mut Response) -> Result<()> {
        for handler in &self.handlers {
            if let Some(identity) = lookup_sign_in(&sign_in.identities, handler.scheme()) {
                debug!(scheme = %handler.scheme(), "Applying sign-in");
                metrics::record_sign_in(handler.scheme().as_str());
                handler.sign_in(identity, response).await?;
            }
        }
        Ok(())
    }

    /// Let every matching handler process the sign-out
    pub async fn sign_out(&self, sign_out: &SignOut, response: &mut Response) -> Result<()> {
        for handler in &self.handlers {
            if lookup_sign_out(&sign_out.schemes, handler.scheme(), handler.mode()) {
                debug!(scheme = %handler.scheme(), "Applying sign-out");
                metrics::record_sign_out(handler.scheme().as_str());
                handler.sign_out(response).await?;
            }
        }
        Ok(())
    }

    /// Dispatch the events the application attached to `response`
    pub async fn process_response(
        &self,
        request: &RequestHead,
        response: &mut Response,
    ) -> Result<()> {
        if let Some(sign_in) = response.extensions_mut().remove::<SignIn>() {
            self.sign_in(&sign_in, response).await?;
        }

        if let Some(sign_out) = response.extensions_mut().remove::<SignOut>() {
            self.sign_out(&sign_out, response).await?;
        }

        let challenge = response.extensions_mut().remove::<Challenge>();
        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = challenge.unwrap_or_default();
            self.challenge(request, &challenge, response).await?;
        }

        Ok(())
    }
}
