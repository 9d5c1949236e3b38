pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod microsoft_account;
pub mod pipeline;
pub mod secrets;
pub mod security;

pub use crate::error::{AuthError, Result};
pub use crate::pipeline::{
    authentication_middleware, AuthenticationBuilder, AuthenticationPipeline, Challenge,
    CurrentUser, SignIn, SignOut,
};
pub use crate::security::{AuthenticationMode, Identity, Principal, SchemeName};

use crate::config::AuthenticationConfig;
use crate::secrets::SecretsProvider;
use tracing::info;

/// Build a pipeline from a YAML configuration file
pub async fn init_authentication<P: AsRef<std::path::Path>>(
    config_path: P,
    secrets: &dyn SecretsProvider,
) -> Result<AuthenticationPipeline> {
    let config = AuthenticationConfig::from_file(config_path)?;
    let pipeline = AuthenticationBuilder::from_config(&config, secrets)
        .await?
        .build()?;

    info!(
        schemes = ?pipeline.schemes(),
        "Authentication pipeline ready"
    );

    Ok(pipeline)
}

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "authkit=debug,tower_http=debug";

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_target(false)
        .compact()
        .init();
}
