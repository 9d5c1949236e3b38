use crate::error::{AuthError, Result};
use secrecy::Secret;
use std::collections::HashMap;
use std::env;
use tracing::debug;

/// Secret string wrapper that keeps client secrets out of logs
pub type SecretString = Secret<String>;

/// Source of named secrets referenced from configuration
pub trait SecretsProvider: Send + Sync {
    /// Get a secret by key
    fn get_secret(&self, key: &str) -> Result<SecretString>;

    /// Check if a secret exists
    fn has_secret(&self, key: &str) -> bool;
}

/// Reads `<prefix><KEY>` environment variables
#[derive(Debug, Clone)]
pub struct EnvSecretsProvider {
    prefix: String,
}

impl EnvSecretsProvider {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase())
    }
}

impl Default for EnvSecretsProvider {
    fn default() -> Self {
        Self::new("AUTHKIT_SECRET_")
    }
}

impl SecretsProvider for EnvSecretsProvider {
    fn get_secret(&self, key: &str) -> Result<SecretString> {
        let env_key = self.env_key(key);
        debug!(key = %env_key, "Resolving secret from environment");
        env::var(&env_key)
            .map(Secret::new)
            .map_err(|_| AuthError::Config(format!("Secret '{}' not found in environment", key)))
    }

    fn has_secret(&self, key: &str) -> bool {
        env::var(self.env_key(key)).is_ok()
    }
}

/// In-memory secrets provider (for testing or embedded setups)
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretsProvider {
    secrets: HashMap<String, SecretString>,
}

impl InMemorySecretsProvider {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self {
            secrets: secrets
                .into_iter()
                .map(|(k, v)| (k, Secret::new(v)))
                .collect(),
        }
    }

    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.secrets
            .insert(key.to_string(), Secret::new(value.to_string()));
        self
    }
}

impl SecretsProvider for InMemorySecretsProvider {
    fn get_secret(&self, key: &str) -> Result<SecretString> {
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| AuthError::Config(format!("Secret '{}' not found", key)))
    }

    fn has_secret(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_env_secrets_provider() {
        std::env::set_var("AUTHKIT_SECRET_MS_CLIENT_SECRET", "from-env");

        let provider = EnvSecretsProvider::default();
        assert!(provider.has_secret("ms_client_secret"));

        let secret = provider.get_secret("ms_client_secret").unwrap();
        assert_eq!(secret.expose_secret(), "from-env");

        std::env::remove_var("AUTHKIT_SECRET_MS_CLIENT_SECRET");
        assert!(provider.get_secret("ms_client_secret").is_err());
    }

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemorySecretsProvider::default().with_secret("key1", "value1");

        assert!(provider.has_secret("key1"));
        assert!(!provider.has_secret("key2"));

        let secret = provider.get_secret("key1").unwrap();
        assert_eq!(secret.expose_secret(), "value1");
        assert!(matches!(
            provider.get_secret("key2"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let provider = InMemorySecretsProvider::default().with_secret("key", "hunter2");
        let rendered = format!("{:?}", provider);
        assert!(!rendered.contains("hunter2"));
    }
}
