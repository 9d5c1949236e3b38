pub mod claims;
pub mod helper;
pub mod policy;
pub mod scheme;

pub use claims::{claim_types, Claim, Identity, Principal};
pub use helper::{
    add_user_identity, compose_identity, lookup_challenge, lookup_sign_in, lookup_sign_out,
    should_handle, PrincipalSlot, RequestPrincipal,
};
pub use policy::{
    AuthorizationPolicy, AuthorizationPolicyBuilder, AuthorizationRequirement,
    ClaimsRequirement, DenyAnonymousRequirement,
};
pub use scheme::{AuthenticationMode, SchemeName};
