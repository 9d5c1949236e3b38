use crate::error::{AuthError, Result};
use crate::security::{AuthenticationMode, SchemeName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Top-level authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    /// Registered schemes, in pipeline order
    #[serde(default)]
    pub schemes: Vec<SchemeConfig>,
}

/// One named authentication scheme and the handler backing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// Scheme name (compared case-sensitively)
    pub name: SchemeName,
    /// Active or passive participation; the handler's default applies when omitted
    #[serde(default)]
    pub mode: Option<AuthenticationMode>,
    /// JWT bearer handler
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
    /// API key handler
    #[serde(default)]
    pub api_key: Option<ApiKeyConfig>,
    /// Microsoft Account OAuth handler
    #[serde(default)]
    pub microsoft_account: Option<MicrosoftAccountConfig>,
}

/// JWT authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for HS256 (if using symmetric encryption)
    pub secret: Option<String>,
    /// Public key for RS256 (if using asymmetric encryption)
    pub public_key: Option<String>,
    /// Algorithm to use (HS256 or RS256)
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Issuer to validate
    pub issuer: Option<String>,
    /// Audience to validate
    pub audience: Option<String>,
}

/// API key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    /// Header name for API key
    #[serde(default = "default_api_key_header")]
    pub header: String,
    /// In-memory API keys (key -> description)
    #[serde(default)]
    pub keys: std::collections::HashMap<String, String>,
    /// Redis configuration for distributed key storage
    pub redis: Option<RedisConfig>,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Key prefix for API keys
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Microsoft Account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrosoftAccountConfig {
    /// Application (client) id
    pub client_id: String,
    /// Inline client secret
    pub client_secret: Option<String>,
    /// Name of a secret to resolve through the secrets provider
    pub client_secret_ref: Option<String>,
    /// Requested scopes (defaults to wl.basic)
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Path the provider redirects back to
    pub callback_path: Option<String>,
    /// Display caption for login pages
    pub caption: Option<String>,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_redis_prefix() -> String {
    "authkit:apikey:".to_string()
}

impl SchemeConfig {
    /// Number of handler kinds configured on this scheme
    fn handler_kinds(&self) -> usize {
        [
            self.jwt.is_some(),
            self.api_key.is_some(),
            self.microsoft_account.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl AuthenticationConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AuthError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for scheme in &self.schemes {
            if scheme.name.is_empty() {
                return Err(AuthError::Config(
                    "Scheme name cannot be empty".to_string(),
                ));
            }

            if !seen.insert(scheme.name.clone()) {
                return Err(AuthError::DuplicateScheme(scheme.name.to_string()));
            }

            match scheme.handler_kinds() {
                1 => {}
                0 => {
                    return Err(AuthError::Config(format!(
                        "No handler configured for scheme: {}",
                        scheme.name
                    )))
                }
                _ => {
                    return Err(AuthError::Config(format!(
                        "Exactly one handler must be configured for scheme: {}",
                        scheme.name
                    )))
                }
            }

            if let Some(api_key) = &scheme.api_key {
                if api_key.header.is_empty() {
                    return Err(AuthError::Config(format!(
                        "API key header cannot be empty for scheme: {}",
                        scheme.name
                    )));
                }
            }

            if let Some(microsoft) = &scheme.microsoft_account {
                if microsoft.client_id.is_empty() {
                    return Err(AuthError::Config(format!(
                        "Microsoft Account client_id cannot be empty for scheme: {}",
                        scheme.name
                    )));
                }
                if microsoft.client_secret.is_none() && microsoft.client_secret_ref.is_none() {
                    return Err(AuthError::Config(format!(
                        "Microsoft Account client secret is required for scheme: {}",
                        scheme.name
                    )));
                }
            }
        }

        Ok(())
    }
}
