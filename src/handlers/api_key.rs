use crate::config::ApiKeyConfig;
use crate::error::{AuthError, Result};
use crate::pipeline::{Challenge, RequestHead};
use crate::security::{claim_types, Claim, Identity};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use redis::{aio::ConnectionManager, AsyncCommands};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthenticationHandler, HandlerOptions};

/// API key handler with in-memory and Redis support
#[derive(Clone)]
pub struct ApiKeyHandler {
    options: HandlerOptions,
    header_name: HeaderName,
    /// Keyed by SHA-256 fingerprint, never by the raw key
    in_memory_keys: Arc<RwLock<HashMap<String, ApiKeyInfo>>>,
    redis_store: Option<Arc<RedisKeyStore>>,
}

#[derive(Debug, Clone)]
struct ApiKeyInfo {
    description: String,
}

/// Redis-backed key store
pub struct RedisKeyStore {
    connection: Arc<RwLock<ConnectionManager>>,
    prefix: String,
}

/// Hex SHA-256 fingerprint of an API key
pub fn fingerprint(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

impl ApiKeyHandler {
    /// Create a new API key handler from configuration
    pub async fn new(options: HandlerOptions, config: &ApiKeyConfig) -> Result<Self> {
        let header_name = HeaderName::try_from(config.header.as_str()).map_err(|e| {
            AuthError::Config(format!("Invalid API key header '{}': {}", config.header, e))
        })?;

        let in_memory_keys = config
            .keys
            .iter()
            .map(|(key, description)| {
                (
                    fingerprint(key),
                    ApiKeyInfo {
                        description: description.clone(),
                    },
                )
            })
            .collect();

        let redis_store = if let Some(redis_config) = &config.redis {
            let client = redis::Client::open(redis_config.url.as_str()).map_err(|e| {
                AuthError::Config(format!("Failed to create Redis client: {}", e))
            })?;

            let connection = ConnectionManager::new(client).await.map_err(|e| {
                AuthError::Config(format!("Failed to connect to Redis: {}", e))
            })?;

            Some(Arc::new(RedisKeyStore {
                connection: Arc::new(RwLock::new(connection)),
                prefix: redis_config.prefix.clone(),
            }))
        } else {
            None
        };

        Ok(Self {
            options,
            header_name,
            in_memory_keys: Arc::new(RwLock::new(in_memory_keys)),
            redis_store,
        })
    }

    /// Look the key up in memory first, then in Redis
    async fn lookup(&self, api_key: &str) -> Result<Option<ApiKeyInfo>> {
        let id = fingerprint(api_key);

        let in_memory = self.in_memory_keys.read().await;
        if let Some(info) = in_memory.get(&id) {
            return Ok(Some(info.clone()));
        }
        drop(in_memory);

        if let Some(redis_store) = &self.redis_store {
            return redis_store.get_key(api_key).await;
        }

        Ok(None)
    }

    /// Extract API key from request headers
    fn extract_api_key(&self, headers: &HeaderMap) -> Result<Option<String>> {
        let header_value = match headers.get(&self.header_name) {
            Some(value) => value,
            None => return Ok(None),
        };

        let api_key = header_value
            .to_str()
            .map_err(|_| AuthError::InvalidApiKey)?
            .to_string();

        if api_key.is_empty() {
            return Err(AuthError::InvalidApiKey);
        }

        Ok(Some(api_key))
    }

    /// Add a new API key (in-memory)
    pub async fn add_key(&self, key: &str, description: String) {
        let mut keys = self.in_memory_keys.write().await;
        keys.insert(fingerprint(key), ApiKeyInfo { description });
    }

    /// Remove an API key (in-memory)
    pub async fn remove_key(&self, key: &str) -> bool {
        let mut keys = self.in_memory_keys.write().await;
        keys.remove(&fingerprint(key)).is_some()
    }

    /// Check if a key exists (in-memory or Redis)
    pub async fn key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.lookup(key).await?.is_some())
    }
}

impl RedisKeyStore {
    /// Get the key's description from Redis
    async fn get_key(&self, key: &str) -> Result<Option<ApiKeyInfo>> {
        let mut conn = self.connection.write().await;
        let redis_key = format!("{}{}", self.prefix, key);

        let description: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| AuthError::Internal(format!("Redis error: {}", e)))?;

        Ok(description.map(|description| ApiKeyInfo { description }))
    }
}

#[async_trait]
impl AuthenticationHandler for ApiKeyHandler {
    fn options(&self) -> &HandlerOptions {
        &self.options
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>> {
        let api_key = match self.extract_api_key(headers)? {
            Some(key) => key,
            None => return Ok(None),
        };

        let info = self.lookup(&api_key).await?.ok_or(AuthError::InvalidApiKey)?;
        debug!(scheme = %self.options.scheme, key = %info.description, "API key accepted");

        Ok(Some(Identity::new(
            self.options.scheme.clone(),
            vec![
                Claim::new(claim_types::NAME_IDENTIFIER, fingerprint(&api_key)),
                Claim::new(claim_types::NAME, info.description),
            ],
        )))
    }

    async fn challenge(
        &self,
        _request: &RequestHead,
        _challenge: &Challenge,
        response: &mut Response,
    ) -> Result<()> {
        let value = format!("ApiKey header=\"{}\"", self.header_name);
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AuthError::Internal(format!("Invalid challenge header: {}", e)))?;
        response
            .headers_mut()
            .append(header::WWW_AUTHENTICATE, value);
        Ok(())
    }
}
