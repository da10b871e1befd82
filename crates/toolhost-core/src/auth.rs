//! Authorization gate (C6): a pure predicate over auth-service names.
//!
//! Tokens are never inspected here — verification is the boundary's
//! responsibility. This module operates only on the names a request has
//! already been verified to carry.

/// `authorized(tool.authRequired, verifiedAuthServiceNames) ≡
/// tool.authRequired = ∅ ∨ ∃ s ∈ verified: s ∈ tool.authRequired`.
#[must_use]
pub fn authorized(required: &[String], verified: &[String]) -> bool {
    required.is_empty() || verified.iter().any(|s| required.iter().any(|r| r == s))
}

#[cfg(test)]
mod tests {
    use super::authorized;

    #[test]
    fn empty_requirement_always_authorized() {
        assert!(authorized(&[], &[]));
        assert!(authorized(&[], &["gauth".to_string()]));
    }

    #[test]
    fn requires_intersection() {
        let required = vec!["a".to_string(), "b".to_string()];
        assert!(authorized(&required, &["b".to_string()]));
        assert!(!authorized(&required, &["c".to_string()]));
        assert!(!authorized(&required, &[]));
    }
}
