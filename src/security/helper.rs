//! Helpers shared by authentication handlers: scheme matching for
//! challenge / sign-in / sign-out events and identity composition.

use super::claims::{Identity, Principal};
use super::scheme::{AuthenticationMode, SchemeName};

/// Decide whether the handler owning `own_scheme` reacts to an event that
/// targets `requested` schemes.
///
/// With no schemes requested only active handlers react. Otherwise the
/// handler reacts iff its scheme is named, compared ordinally.
pub fn should_handle(
    requested: &[SchemeName],
    own_scheme: &SchemeName,
    mode: AuthenticationMode,
) -> bool {
    if requested.is_empty() {
        return mode == AuthenticationMode::Active;
    }
    requested.iter().any(|scheme| scheme == own_scheme)
}

/// Whether a handler should answer a challenge
pub fn lookup_challenge(
    requested: &[SchemeName],
    own_scheme: &SchemeName,
    mode: AuthenticationMode,
) -> bool {
    should_handle(requested, own_scheme, mode)
}

/// Whether a handler should process a sign-out
pub fn lookup_sign_out(
    requested: &[SchemeName],
    own_scheme: &SchemeName,
    mode: AuthenticationMode,
) -> bool {
    should_handle(requested, own_scheme, mode)
}

/// Find the sign-in identity addressed to `own_scheme`, if any
pub fn lookup_sign_in<'a>(identities: &'a [Identity], own_scheme: &SchemeName) -> Option<&'a Identity> {
    identities
        .iter()
        .find(|identity| identity.authentication_type() == Some(own_scheme))
}

/// Build a new principal from `identity` followed by every authenticated
/// identity of `existing`, in their original order.
pub fn compose_identity(existing: Option<&Principal>, identity: Identity) -> Principal {
    let mut composed = Principal::new(identity);

    if let Some(existing) = existing {
        for prior in existing.identities() {
            if prior.is_authenticated() {
                composed.add_identity(prior.clone());
            }
        }
    }

    composed
}

/// Storage for the current request's principal
pub trait PrincipalSlot {
    fn user(&self) -> Option<&Principal>;
    fn set_user(&mut self, principal: Principal);
}

/// Compose `identity` onto the principal held by `slot` and replace it
pub fn add_user_identity<S: PrincipalSlot + ?Sized>(slot: &mut S, identity: Identity) {
    let composed = compose_identity(slot.user(), identity);
    slot.set_user(composed);
}

impl PrincipalSlot for Option<Principal> {
    fn user(&self) -> Option<&Principal> {
        self.as_ref()
    }

    fn set_user(&mut self, principal: Principal) {
        *self = Some(principal);
    }
}

/// Request extension carrying the principal the pipeline produced
#[derive(Debug, Clone)]
pub struct RequestPrincipal(pub Principal);

impl PrincipalSlot for http::Extensions {
    fn user(&self) -> Option<&Principal> {
        self.get::<RequestPrincipal>().map(|p| &p.0)
    }

    fn set_user(&mut self, principal: Principal) {
        self.insert(RequestPrincipal(principal));
    }
}
