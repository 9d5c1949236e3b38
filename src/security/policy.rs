use super::claims::Principal;
use super::scheme::SchemeName;
use crate::error::{AuthError, Result};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// A condition a principal must meet to be authorized
pub trait AuthorizationRequirement: Send + Sync + Debug {
    fn is_satisfied(&self, principal: &Principal) -> bool;

    /// Short human-readable description, used in denial messages
    fn describe(&self) -> String;
}

/// Requires at least one authenticated identity
#[derive(Debug, Clone, Default)]
pub struct DenyAnonymousRequirement;

impl AuthorizationRequirement for DenyAnonymousRequirement {
    fn is_satisfied(&self, principal: &Principal) -> bool {
        principal.is_authenticated()
    }

    fn describe(&self) -> String {
        "authenticated user".to_string()
    }
}

/// Requires a claim of the given type, optionally restricted to a set of values
#[derive(Debug, Clone)]
pub struct ClaimsRequirement {
    pub claim_type: String,
    /// Accepted values (empty means any value)
    pub allowed_values: Vec<String>,
}

impl AuthorizationRequirement for ClaimsRequirement {
    fn is_satisfied(&self, principal: &Principal) -> bool {
        principal
            .identities()
            .iter()
            .flat_map(|identity| identity.claims())
            .filter(|claim| claim.claim_type == self.claim_type)
            .any(|claim| {
                self.allowed_values.is_empty()
                    || self.allowed_values.iter().any(|v| *v == claim.value)
            })
    }

    fn describe(&self) -> String {
        if self.allowed_values.is_empty() {
            format!("claim '{}'", self.claim_type)
        } else {
            format!(
                "claim '{}' with one of [{}]",
                self.claim_type,
                self.allowed_values.join(", ")
            )
        }
    }
}

/// A set of requirements evaluated against identities from selected schemes
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    requirements: Vec<Arc<dyn AuthorizationRequirement>>,
    authentication_schemes: Vec<SchemeName>,
}

impl AuthorizationPolicy {
    pub fn builder() -> AuthorizationPolicyBuilder {
        AuthorizationPolicyBuilder::default()
    }

    pub fn requirements(&self) -> &[Arc<dyn AuthorizationRequirement>] {
        &self.requirements
    }

    pub fn authentication_schemes(&self) -> &[SchemeName] {
        &self.authentication_schemes
    }

    /// Keep only the identities authenticated by this policy's schemes.
    /// A policy without schemes sees every identity.
    pub fn narrow(&self, principal: &Principal) -> Principal {
        if self.authentication_schemes.is_empty() {
            return principal.clone();
        }

        let mut narrowed = Principal::empty();
        for identity in principal.identities() {
            let selected = identity
                .authentication_type()
                .is_some_and(|scheme| self.authentication_schemes.contains(scheme));
            if selected {
                narrowed.add_identity(identity.clone());
            }
        }
        narrowed
    }

    /// Evaluate every requirement against the narrowed principal
    pub fn authorize(&self, principal: &Principal) -> Result<()> {
        let narrowed = self.narrow(principal);

        let failed = self
            .requirements
            .iter()
            .find(|requirement| !requirement.is_satisfied(&narrowed));

        match failed {
            None => Ok(()),
            Some(requirement) => {
                debug!(requirement = %requirement.describe(), "Authorization requirement not met");
                if narrowed.is_authenticated() {
                    Err(AuthError::Forbidden(format!(
                        "requires {}",
                        requirement.describe()
                    )))
                } else {
                    Err(AuthError::Unauthorized(format!(
                        "requires {}",
                        requirement.describe()
                    )))
                }
            }
        }
    }
}

/// Builder for [`AuthorizationPolicy`]
#[derive(Debug, Default)]
pub struct AuthorizationPolicyBuilder {
    policy: AuthorizationPolicy,
}

impl AuthorizationPolicyBuilder {
    pub fn require_authenticated_user(mut self) -> Self {
        self.policy
            .requirements
            .push(Arc::new(DenyAnonymousRequirement));
        self
    }

    pub fn require_claim<I, V>(mut self, claim_type: impl Into<String>, allowed_values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.policy.requirements.push(Arc::new(ClaimsRequirement {
            claim_type: claim_type.into(),
            allowed_values: allowed_values.into_iter().map(Into::into).collect(),
        }));
        self
    }

    pub fn add_requirement(mut self, requirement: Arc<dyn AuthorizationRequirement>) -> Self {
        self.policy.requirements.push(requirement);
        self
    }

    pub fn add_authentication_scheme(mut self, scheme: impl Into<SchemeName>) -> Self {
        self.policy.authentication_schemes.push(scheme.into());
        self
    }

    pub fn build(self) -> AuthorizationPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::claims::{claim_types, Claim, Identity};

    fn admin_via_bearer() -> Principal {
        let mut principal = Principal::new(Identity::new(
            "Bearer",
            vec![Claim::new(claim_types::ROLE, "admin")],
        ));
        principal.add_identity(Identity::new(
            "ApiKey",
            vec![Claim::new(claim_types::ROLE, "reader")],
        ));
        principal
    }

    #[test]
    fn test_empty_policy_allows_anonymous() {
        let policy = AuthorizationPolicy::builder().build();
        assert!(policy.authorize(&Principal::anonymous()).is_ok());
    }

    #[test]
    fn test_deny_anonymous() {
        let policy = AuthorizationPolicy::builder()
            .require_authenticated_user()
            .build();

        let err = policy.authorize(&Principal::anonymous()).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
        assert!(policy.authorize(&admin_via_bearer()).is_ok());
    }

    #[test]
    fn test_claim_values() {
        let policy = AuthorizationPolicy::builder()
            .require_claim(claim_types::ROLE, ["admin", "owner"])
            .build();
        assert!(policy.authorize(&admin_via_bearer()).is_ok());

        let policy = AuthorizationPolicy::builder()
            .require_claim(claim_types::ROLE, ["owner"])
            .build();
        let err = policy.authorize(&admin_via_bearer()).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
        assert_eq!(
            err.to_string(),
            "Access denied: requires claim 'role' with one of [owner]"
        );
    }

    #[test]
    fn test_claim_any_value() {
        let policy = AuthorizationPolicy::builder()
            .require_claim(claim_types::ROLE, Vec::<String>::new())
            .build();
        assert!(policy.authorize(&admin_via_bearer()).is_ok());
    }

    #[test]
    fn test_schemes_narrow_identities() {
        let policy = AuthorizationPolicy::builder()
            .add_authentication_scheme("ApiKey")
            .require_claim(claim_types::ROLE, ["admin"])
            .build();

        let narrowed = policy.narrow(&admin_via_bearer());
        assert_eq!(narrowed.identities().len(), 1);
        assert!(matches!(
            policy.authorize(&admin_via_bearer()),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unknown_scheme_leaves_nothing_authenticated() {
        let policy = AuthorizationPolicy::builder()
            .add_authentication_scheme("apikey")
            .require_authenticated_user()
            .build();

        assert!(matches!(
            policy.authorize(&admin_via_bearer()),
            Err(AuthError::Unauthorized(_))
        ));
    }
}
