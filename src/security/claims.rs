use super::scheme::SchemeName;

/// Well-known claim types produced by the built-in handlers
pub mod claim_types {
    pub const NAME_IDENTIFIER: &str = "sub";
    pub const NAME: &str = "name";
    pub const ROLE: &str = "role";
    pub const ISSUER: &str = "iss";
    pub const AUDIENCE: &str = "aud";
    pub const EXPIRATION: &str = "exp";
}

/// Issuer recorded on claims that no external authority vouched for
pub const LOCAL_AUTHORITY: &str = "LOCAL AUTHORITY";

/// A single attribute asserted about an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            issuer: LOCAL_AUTHORITY.to_string(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// The result of one authentication: which scheme vouched for it, and what it asserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    authentication_type: Option<SchemeName>,
    claims: Vec<Claim>,
}

impl Identity {
    /// Create an identity authenticated by `scheme`
    pub fn new(scheme: impl Into<SchemeName>, claims: Vec<Claim>) -> Self {
        Self {
            authentication_type: Some(scheme.into()),
            claims,
        }
    }

    /// Create an identity that no scheme authenticated
    pub fn unauthenticated(claims: Vec<Claim>) -> Self {
        Self {
            authentication_type: None,
            claims,
        }
    }

    /// The anonymous identity a request starts out with
    pub fn anonymous() -> Self {
        Self::unauthenticated(Vec::new())
    }

    pub fn authentication_type(&self) -> Option<&SchemeName> {
        self.authentication_type.as_ref()
    }

    /// Derived from the authentication type, never stored
    pub fn is_authenticated(&self) -> bool {
        self.authentication_type
            .as_ref()
            .is_some_and(|scheme| !scheme.is_empty())
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }

    /// Value of the `name` claim, if any
    pub fn name(&self) -> Option<&str> {
        self.find_first(claim_types::NAME).map(|c| c.value.as_str())
    }
}

/// Who the current request is acting as: zero or more identities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    identities: Vec<Identity>,
}

impl Principal {
    pub fn new(identity: Identity) -> Self {
        Self {
            identities: vec![identity],
        }
    }

    /// A principal holding no identities at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The principal a host seeds each request with
    pub fn anonymous() -> Self {
        Self::new(Identity::anonymous())
    }

    pub fn add_identity(&mut self, identity: Identity) {
        self.identities.push(identity);
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// The first identity, which is the most recently composed one
    pub fn identity(&self) -> Option<&Identity> {
        self.identities.first()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identities.iter().any(Identity::is_authenticated)
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.identities
            .iter()
            .find_map(|identity| identity.find_first(claim_type))
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.has_claim(claim_type, value))
    }

    /// Schemes that authenticated this principal, in identity order
    pub fn authentication_schemes(&self) -> Vec<&SchemeName> {
        self.identities
            .iter()
            .filter(|identity| identity.is_authenticated())
            .filter_map(Identity::authentication_type)
            .collect()
    }
}
