//! Bearer-token authentication (spec §6.1: "Bearer tokens per appliance
//! (generated at provision time)"; §4.6: "Authentication is an optional
//! `Bearer` token (strict if configured)"). Tokens are minted once, at
//! `POST /api/provision/claim`, and are site-scoped so they survive
//! hardware replacement (spec §3: a Site's identity persists across
//! Appliance rows).

use axum::http::HeaderMap;

use crate::error::ControlPlaneError;

fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Checks the `Authorization` header against `expected` (the site's
/// stored bearer token). When `require` is `false`, a missing or
/// mismatched header is tolerated (spec: "optional ... strict if
/// configured"); when `true`, both a missing header and a mismatch are
/// rejected.
pub fn check_bearer(require: bool, headers: &HeaderMap, expected: Option<&str>) -> Result<(), ControlPlaneError> {
    if !require {
        return Ok(());
    }
    let presented = bearer_from_headers(headers);
    match (presented, expected) {
        (Some(p), Some(e)) if p == e => Ok(()),
        _ => Err(ControlPlaneError::Unauthorized("missing or invalid bearer token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        h
    }

    #[test]
    fn not_required_always_passes() {
        assert!(check_bearer(false, &HeaderMap::new(), Some("tok")).is_ok());
    }

    #[test]
    fn required_and_matching_passes() {
        assert!(check_bearer(true, &headers_with("tok"), Some("tok")).is_ok());
    }

    #[test]
    fn required_and_missing_fails() {
        assert!(check_bearer(true, &HeaderMap::new(), Some("tok")).is_err());
    }

    #[test]
    fn required_and_mismatched_fails() {
        assert!(check_bearer(true, &headers_with("wrong"), Some("tok")).is_err());
    }
}
