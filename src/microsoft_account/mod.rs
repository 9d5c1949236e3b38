//! Microsoft Account (OAuth 2.0) provider.
//!
//! Only the outbound half of the flow lives here: a challenge redirects the
//! browser to the Microsoft authorization endpoint. Exchanging the returned
//! code for tokens at the callback path is left to the host.

use crate::config::MicrosoftAccountConfig;
use crate::error::{AuthError, Result};
use crate::handlers::{AuthenticationHandler, HandlerOptions};
use crate::pipeline::{AuthenticationBuilder, Challenge, RequestHead};
use crate::secrets::{SecretString, SecretsProvider};
use crate::security::{AuthenticationMode, Identity, SchemeName};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_SCHEME: &str = "Microsoft";
pub const DEFAULT_CAPTION: &str = "Microsoft";
pub const DEFAULT_CALLBACK_PATH: &str = "/signin-microsoft";
pub const DEFAULT_SCOPE: &str = "wl.basic";
pub const AUTHORIZATION_ENDPOINT: &str = "https://login.live.com/oauth20_authorize.srf";
pub const TOKEN_ENDPOINT: &str = "https://login.live.com/oauth20_token.srf";
pub const USER_INFORMATION_ENDPOINT: &str = "https://apis.live.net/v5.0/me";

/// Prefix of the cookie tying a challenge to its callback
pub const CORRELATION_COOKIE_PREFIX: &str = ".authkit.correlation.";

/// Options for the Microsoft Account handler
#[derive(Debug, Clone)]
pub struct MicrosoftAccountOptions {
    pub handler: HandlerOptions,
    /// Display name for the host's login page
    pub caption: String,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub authorization_endpoint: String,
    /// Where the host exchanges the callback code for tokens
    pub token_endpoint: String,
    /// Where the host fetches the signed-in user's profile
    pub user_information_endpoint: String,
    pub callback_path: String,
    pub scopes: Vec<String>,
}

impl Default for MicrosoftAccountOptions {
    fn default() -> Self {
        Self {
            handler: HandlerOptions::passive(DEFAULT_SCHEME),
            caption: DEFAULT_CAPTION.to_string(),
            client_id: String::new(),
            client_secret: None,
            authorization_endpoint: AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            user_information_endpoint: USER_INFORMATION_ENDPOINT.to_string(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
        }
    }
}

impl MicrosoftAccountOptions {
    /// Build options for a configured scheme, resolving the client secret
    pub fn from_config(
        scheme: &SchemeName,
        mode: Option<AuthenticationMode>,
        config: &MicrosoftAccountConfig,
        secrets: &dyn SecretsProvider,
    ) -> Result<Self> {
        let mut options = Self::default();
        options.handler = HandlerOptions::new(
            scheme.clone(),
            mode.unwrap_or(AuthenticationMode::Passive),
        );
        options.client_id = config.client_id.clone();

        options.client_secret = match (&config.client_secret, &config.client_secret_ref) {
            (Some(inline), _) => Some(Secret::new(inline.clone())),
            (None, Some(reference)) => Some(secrets.get_secret(reference)?),
            (None, None) => None,
        };

        if !config.scopes.is_empty() {
            options.scopes = config.scopes.clone();
        }
        if let Some(callback_path) = &config.callback_path {
            options.callback_path = callback_path.clone();
        }
        if let Some(caption) = &config.caption {
            options.caption = caption.clone();
        }

        Ok(options)
    }
}

fn parse_endpoint(kind: &str, endpoint: &str) -> Result<Url> {
    Url::parse(endpoint)
        .map_err(|e| AuthError::Config(format!("Invalid {} endpoint '{}': {}", kind, endpoint, e)))
}

/// Payload carried through the provider in the `state` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Matches the correlation cookie set with the challenge
    pub correlation: String,
    /// Where to send the user once signed in
    pub redirect_uri: String,
}

impl AuthorizationState {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AuthError::Serialization(format!("Failed to encode state: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(state: &str) -> Result<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(state)
            .map_err(|e| AuthError::Serialization(format!("Malformed state: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| AuthError::Serialization(format!("Malformed state: {}", e)))
    }
}

/// Handler redirecting challenged requests to Microsoft's login page
pub struct MicrosoftAccountHandler {
    options: MicrosoftAccountOptions,
    authorization_url: Url,
}

impl MicrosoftAccountHandler {
    pub fn new(options: MicrosoftAccountOptions) -> Result<Self> {
        if options.client_id.is_empty() {
            return Err(AuthError::Config(format!(
                "Microsoft Account client_id is required for scheme: {}",
                options.handler.scheme
            )));
        }

        if options.client_secret.is_none() {
            return Err(AuthError::Config(format!(
                "Microsoft Account client_secret is required for scheme: {}",
                options.handler.scheme
            )));
        }

        if !options.callback_path.starts_with('/') {
            return Err(AuthError::Config(format!(
                "Callback path must start with '/': {}",
                options.callback_path
            )));
        }

        let authorization_url = parse_endpoint("authorization", &options.authorization_endpoint)?;
        parse_endpoint("token", &options.token_endpoint)?;
        parse_endpoint("user information", &options.user_information_endpoint)?;

        Ok(Self {
            options,
            authorization_url,
        })
    }

    pub fn microsoft_options(&self) -> &MicrosoftAccountOptions {
        &self.options
    }

    pub fn caption(&self) -> &str {
        &self.options.caption
    }

    /// Absolute callback URL on the host that served `request`
    fn callback_uri(&self, request: &RequestHead) -> Result<(String, bool)> {
        let scheme = request
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .or_else(|| request.uri.scheme_str())
            .unwrap_or("http")
            .to_string();

        let host = request
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri.authority().map(|a| a.to_string()))
            .ok_or_else(|| {
                AuthError::Internal("Cannot determine request host for OAuth redirect".to_string())
            })?;

        let secure = scheme == "https";
        Ok((
            format!("{}://{}{}", scheme, host, self.options.callback_path),
            secure,
        ))
    }
}

#[async_trait]
impl AuthenticationHandler for MicrosoftAccountHandler {
    fn options(&self) -> &HandlerOptions {
        &self.options.handler
    }

    async fn authenticate(&self, _headers: &HeaderMap) -> Result<Option<Identity>> {
        Ok(None)
    }

    async fn challenge(
        &self,
        request: &RequestHead,
        challenge: &Challenge,
        response: &mut Response,
    ) -> Result<()> {
        let (callback_uri, secure) = self.callback_uri(request)?;

        let redirect_uri = challenge.redirect_uri.clone().unwrap_or_else(|| {
            request
                .uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_else(|| "/".to_string())
        });

        let state = AuthorizationState {
            correlation: Uuid::new_v4().to_string(),
            redirect_uri,
        };

        let mut location = self.authorization_url.clone();
        location
            .query_pairs_mut()
            .append_pair("client_id", &self.options.client_id)
            .append_pair("scope", &self.options.scopes.join(" "))
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &callback_uri)
            .append_pair("state", &state.encode()?);

        let mut cookie = format!(
            "{}{}={}; Path=/; HttpOnly; SameSite=Lax",
            CORRELATION_COOKIE_PREFIX, self.options.handler.scheme, state.correlation
        );
        if secure {
            cookie.push_str("; Secure");
        }

        let location = HeaderValue::from_str(location.as_str())
            .map_err(|e| AuthError::Internal(format!("Invalid redirect location: {}", e)))?;
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| AuthError::Internal(format!("Invalid correlation cookie: {}", e)))?;

        debug!(
            scheme = %self.options.handler.scheme,
            callback = %callback_uri,
            "Redirecting to Microsoft Account login"
        );

        *response.status_mut() = StatusCode::FOUND;
        response.headers_mut().insert(header::LOCATION, location);
        response.headers_mut().append(header::SET_COOKIE, cookie);

        Ok(())
    }
}

/// Registration helper for the Microsoft Account provider
pub trait MicrosoftAccountAuthenticationExt: Sized {
    /// Register a Microsoft Account handler.
    ///
    /// Starts from the options registered under `options_name` (defaults if
    /// none were) and applies `configure` on top.
    fn use_microsoft_account_authentication<F>(self, configure: F, options_name: &str) -> Result<Self>
    where
        F: FnOnce(&mut MicrosoftAccountOptions);
}

impl MicrosoftAccountAuthenticationExt for AuthenticationBuilder {
    fn use_microsoft_account_authentication<F>(self, configure: F, options_name: &str) -> Result<Self>
    where
        F: FnOnce(&mut MicrosoftAccountOptions),
    {
        let mut options = self.options::<MicrosoftAccountOptions>(options_name);
        configure(&mut options);

        let handler = MicrosoftAccountHandler::new(options)?;
        info!(
            scheme = %handler.scheme(),
            options_name = %options_name,
            "Registered Microsoft Account authentication"
        );

        Ok(self.add_handler(handler))
    }
}
