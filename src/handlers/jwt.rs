use crate::config::JwtConfig;
use crate::error::{AuthError, Result};
use crate::pipeline::{Challenge, RequestHead};
use crate::security::claims::LOCAL_AUTHORITY;
use crate::security::{claim_types, Claim, Identity};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{AuthenticationHandler, HandlerOptions};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Bearer-token handler validating JWTs
pub struct JwtBearerHandler {
    options: HandlerOptions,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtBearerHandler {
    /// Create a new JWT handler from configuration
    pub fn new(options: HandlerOptions, config: &JwtConfig) -> Result<Self> {
        let algorithm = Self::parse_algorithm(&config.algorithm)?;

        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config.secret.as_ref().ok_or_else(|| {
                    AuthError::Config(
                        "JWT secret is required for HS256/HS384/HS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            _ => {
                let public_key = config.public_key.as_ref().ok_or_else(|| {
                    AuthError::Config(
                        "JWT public key is required for RS256/RS384/RS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_rsa_pem(public_key.as_bytes())
                    .map_err(|e| AuthError::Config(format!("Invalid RSA public key: {}", e)))?
            }
        };

        let mut validation = Validation::new(algorithm);

        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        validation.validate_exp = true;

        Ok(Self {
            options,
            decoding_key,
            validation,
        })
    }

    /// Turn validated token claims into identity claims
    fn to_identity(&self, claims: Claims) -> Identity {
        let issuer = claims
            .iss
            .clone()
            .unwrap_or_else(|| LOCAL_AUTHORITY.to_string());

        let mut identity_claims = vec![Claim::new(claim_types::NAME_IDENTIFIER, claims.sub)];

        if let Some(iss) = claims.iss {
            identity_claims.push(Claim::new(claim_types::ISSUER, iss));
        }
        if let Some(aud) = claims.aud {
            identity_claims.push(Claim::new(claim_types::AUDIENCE, aud));
        }
        identity_claims.push(Claim::new(claim_types::EXPIRATION, claims.exp.to_string()));

        let mut extra: Vec<_> = claims.extra.into_iter().collect();
        extra.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in extra {
            match value {
                serde_json::Value::String(s) => identity_claims.push(Claim::new(key, s)),
                serde_json::Value::Array(items) => {
                    for item in items {
                        identity_claims.push(Claim::new(key.clone(), json_claim_value(item)));
                    }
                }
                other => identity_claims.push(Claim::new(key, other.to_string())),
            }
        }

        let identity_claims = identity_claims
            .into_iter()
            .map(|claim| claim.with_issuer(issuer.clone()))
            .collect();

        Identity::new(self.options.scheme.clone(), identity_claims)
    }

    /// Extract JWT token from Authorization header
    fn extract_token(headers: &HeaderMap) -> Result<Option<String>> {
        let auth_header = match headers.get(header::AUTHORIZATION) {
            Some(value) => value,
            None => return Ok(None),
        };

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidToken("Invalid authorization header".to_string()))?;

        // Other authorization schemes belong to other handlers
        let token = auth_str
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token);

        match token {
            Some(token) if token.trim().is_empty() => {
                Err(AuthError::InvalidToken("Empty bearer token".to_string()))
            }
            Some(token) => Ok(Some(token.trim().to_string())),
            None => Ok(None),
        }
    }

    /// Parse algorithm string to Algorithm enum
    fn parse_algorithm(algo: &str) -> Result<Algorithm> {
        match algo.to_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            _ => Err(AuthError::Config(format!(
                "Unsupported algorithm: {}",
                algo
            ))),
        }
    }
}

fn json_claim_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl AuthenticationHandler for JwtBearerHandler {
    fn options(&self) -> &HandlerOptions {
        &self.options
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>> {
        let token = match Self::extract_token(headers)? {
            Some(token) => token,
            None => return Ok(None),
        };

        let token_data = decode::<Claims>(&token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(format!("Token validation failed: {}", e)))?;

        Ok(Some(self.to_identity(token_data.claims)))
    }

    async fn challenge(
        &self,
        _request: &RequestHead,
        _challenge: &Challenge,
        response: &mut Response,
    ) -> Result<()> {
        response
            .headers_mut()
            .append(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        Ok(())
    }
}
