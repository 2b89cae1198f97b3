//! Auth module (spec.md §4.2): master-password and session-token
//! verification, Origin binding, and per-method capability enforcement.

pub mod session;

use subtle::ConstantTimeEq;

use crate::datastore::types::Session;
use crate::error::{GatewayError, Result};

/// The credential a request presented, already extracted from the
/// `Authorization` header or `?session=` query parameter.
pub enum Credential {
    Password(String),
    SessionToken(String),
}

/// Constant-time comparison of the presented password against the
/// configured one, satisfying the "Auth constant-time" law regardless
/// of where the mismatch occurs.
pub fn verify_master_password(presented: &str, configured: &str) -> bool {
    let presented = presented.as_bytes();
    let configured = configured.as_bytes();
    if presented.len() != configured.len() {
        // Still compare against something of equal length so the
        // length check itself doesn't leak prefix-dependent timing
        // beyond the unavoidable length comparison.
        let padded = vec![0u8; configured.len()];
        let _ = presented.ct_eq(&padded);
        return false;
    }
    presented.ct_eq(configured).into()
}

/// True if a password credential presented with `origin` is valid: the
/// origin's `(scheme, host, port)` must match one of the gateway's
/// configured local origins.
pub fn origin_matches_local(origin: &str, local_origins: &[String]) -> bool {
    local_origins.iter().any(|allowed| allowed == origin)
}

/// Normalize an app domain the way spec.md §4.2 describes: missing
/// scheme assumed `http://`, host lowercased, and if the host does not
/// end in an allow-listed suffix it is rewritten into `<origin>.<suffix>`
/// using the first allow-listed suffix.
pub fn normalize_app_domain(app_domain: &str, allow_listed_suffixes: &[String]) -> String {
    let (scheme, rest) = match app_domain.split_once("://") {
        Some((s, r)) => (s.to_string(), r.to_string()),
        None => ("http".to_string(), app_domain.to_string()),
    };
    let host = rest.to_lowercase();

    let ends_with_allowed = allow_listed_suffixes
        .iter()
        .any(|suffix| host.ends_with(&format!(".{suffix}")));

    if ends_with_allowed || allow_listed_suffixes.is_empty() {
        format!("{scheme}://{host}")
    } else {
        let suffix = &allow_listed_suffixes[0];
        format!("{scheme}://{host}.{suffix}")
    }
}

/// Verify a session is usable for this request: not expired, and the
/// request's Origin matches the session's bound `app_domain`.
pub fn verify_session_usable(session: &Session, origin: &str, now: i64) -> Result<()> {
    if session.is_expired(now) {
        return Err(GatewayError::auth_failed("session expired"));
    }
    if session.app_domain != origin {
        return Err(GatewayError::auth_failed("origin does not match session app_domain"));
    }
    Ok(())
}

/// Refuse the call unless `capability` is in the session's granted
/// `methods` set.
pub fn require_capability(session: &Session, capability: &str) -> Result<()> {
    if session.has_capability(capability) {
        Ok(())
    } else {
        Err(GatewayError::auth_failed(format!(
            "session lacks capability {capability}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_password_succeeds() {
        assert!(verify_master_password("hunter2", "hunter2"));
    }

    #[test]
    fn mismatched_password_fails() {
        assert!(!verify_master_password("hunter2", "hunter3"));
        assert!(!verify_master_password("short", "longer-password"));
    }

    #[test]
    fn domain_without_allowed_suffix_is_rewritten() {
        let suffixes = vec!["id".to_string(), "x".to_string()];
        let normalized = normalize_app_domain("myapp.com", &suffixes);
        assert_eq!(normalized, "http://myapp.com.id");
    }

    #[test]
    fn domain_already_using_allowed_suffix_is_preserved() {
        let suffixes = vec!["id".to_string(), "x".to_string()];
        let normalized = normalize_app_domain("https://myapp.id", &suffixes);
        assert_eq!(normalized, "https://myapp.id");
    }

    #[test]
    fn expired_session_is_rejected() {
        let session = Session {
            blockchain_id: None,
            app_domain: "https://app.id".to_string(),
            methods: Default::default(),
            app_public_keys: vec![],
            device_id: "d1".to_string(),
            expires_at: 100,
            legacy: false,
        };
        let result = verify_session_usable(&session, "https://app.id", 200);
        assert!(result.is_err());
    }

    #[test]
    fn origin_mismatch_is_rejected() {
        let session = Session {
            blockchain_id: None,
            app_domain: "https://app.id".to_string(),
            methods: Default::default(),
            app_public_keys: vec![],
            device_id: "d1".to_string(),
            expires_at: 1000,
            legacy: false,
        };
        let result = verify_session_usable(&session, "https://evil.id", 10);
        assert!(result.is_err());
    }
}
