//! The boundary's (reference) identity-provider verifier.
//!
//! Per spec §1, OIDC/JWT verification is an external collaborator the core
//! never performs. This server implements only the simplest possible
//! verifier — [`Config`]'s `authServices` static `token -> claims` table —
//! so the auth-bound-parameter and `authRequired` machinery can be
//! exercised end-to-end without a real identity provider. A production
//! deployment would replace [`verify_request`] with real token
//! verification while leaving the rest of the pipeline untouched.

use std::collections::HashMap;

use serde_json::Value;
use toolhost_core::ClaimsMap;

use crate::config::AuthServiceConfig;

/// Header name a caller must present for the auth service `name`:
/// `<name>_token`.
fn header_name(service: &str) -> String {
    format!("{service}_token")
}

/// Verify whichever `<service>_token` headers are present against the
/// configured `authServices` static tables, producing the claims map the
/// invocation pipeline reads from and the list of auth-service names the
/// caller is considered to have verified.
///
/// A header naming an unconfigured service, or a token absent from that
/// service's table, is silently not verified — it simply does not appear
/// in the returned names, so downstream auth-bound parameters and
/// `authRequired` checks fail exactly as if the header were absent.
#[must_use]
pub fn verify_request(
    auth_services: &HashMap<String, AuthServiceConfig>,
    headers: &HashMap<String, String>,
) -> (ClaimsMap, Vec<String>) {
    let mut claims = ClaimsMap::new();
    let mut verified = Vec::new();

    for (service_name, service_cfg) in auth_services {
        if service_cfg.kind != "static" {
            continue;
        }
        let Some(token) = headers.get(&header_name(service_name)) else {
            continue;
        };
        if let Some(service_claims) = service_cfg.claims.get(token) {
            let value_claims: HashMap<String, Value> = service_claims.clone();
            claims.insert(service_name.clone(), value_claims);
            verified.push(service_name.clone());
        }
    }

    (claims, verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn services() -> HashMap<String, AuthServiceConfig> {
        let mut claims = HashMap::new();
        let mut fields = HashMap::new();
        fields.insert("email".to_string(), json!("svc@acct"));
        claims.insert("tok-123".to_string(), fields);

        let mut services = HashMap::new();
        services.insert(
            "gauth".to_string(),
            AuthServiceConfig {
                kind: "static".to_string(),
                claims,
            },
        );
        services
    }

    #[test]
    fn verifies_known_token() {
        let mut headers = HashMap::new();
        headers.insert("gauth_token".to_string(), "tok-123".to_string());
        let (claims, verified) = verify_request(&services(), &headers);
        assert_eq!(verified, vec!["gauth".to_string()]);
        assert_eq!(claims["gauth"]["email"], json!("svc@acct"));
    }

    #[test]
    fn unknown_token_is_not_verified() {
        let mut headers = HashMap::new();
        headers.insert("gauth_token".to_string(), "bogus".to_string());
        let (claims, verified) = verify_request(&services(), &headers);
        assert!(verified.is_empty());
        assert!(claims.is_empty());
    }

    #[test]
    fn absent_header_is_not_verified() {
        let (claims, verified) = verify_request(&services(), &HashMap::new());
        assert!(verified.is_empty());
        assert!(claims.is_empty());
    }
}
