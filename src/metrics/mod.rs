//! Authentication counters, recorded through the `metrics` facade.
//! No recorder is installed here; the embedding application picks one.

use metrics::counter;

/// Record an authentication attempt by a handler
pub fn record_auth_attempt(scheme: &str, success: bool) {
    let labels = [("scheme", scheme.to_string())];
    counter!("auth_attempts_total", &labels).increment(1);

    if !success {
        counter!("auth_failures_total", &labels).increment(1);
    }
}

/// Record a challenge issued by a handler
pub fn record_challenge(scheme: &str) {
    let labels = [("scheme", scheme.to_string())];
    counter!("auth_challenges_total", &labels).increment(1);
}

/// Record a sign-in processed by a handler
pub fn record_sign_in(scheme: &str) {
    let labels = [("scheme", scheme.to_string())];
    counter!("auth_sign_ins_total", &labels).increment(1);
}

/// Record a sign-out processed by a handler
pub fn record_sign_out(scheme: &str) {
    let labels = [("scheme", scheme.to_string())];
    counter!("auth_sign_outs_total", &labels).increment(1);
}
