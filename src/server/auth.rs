//! Admin-request authentication.
//!
//! Token-based gate using HMAC-SHA256, sitting ahead of any
//! state-mutating admin endpoint. The webhook route itself relies on
//! payload signature verification instead (see
//! [`crate::validation::WebhookValidator`]).
//!
//! ## Token Format
//!
//! - 8 bytes: issue timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 over `role || timestamp`
//!
//! Total: 40 bytes, hex-encoded for transport, carried as
//! `Authorization: Bearer <token>`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_LEN: usize = 8;
const MAC_LEN: usize = 32;

/// Allowed clock skew for tokens stamped slightly in the future.
const MAX_FUTURE_SKEW: Duration = Duration::from_secs(60);

/// Validator and issuer for admin tokens.
#[derive(Clone)]
pub struct AdminAuth {
    secret: Vec<u8>,
    token_expiry: Duration,
}

impl AdminAuth {
    /// Creates an auth gate with a 24 hour token expiry.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Issue a token for `role`, stamped now.
    pub fn create_token(&self, role: &str) -> String {
        self.token_at(role, now_ms())
    }

    fn token_at(&self, role: &str, timestamp_ms: u64) -> String {
        let ts = timestamp_ms.to_be_bytes();

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts any key length");
        mac.update(role.as_bytes());
        mac.update(&ts);

        let mut token = Vec::with_capacity(TIMESTAMP_LEN + MAC_LEN);
        token.extend_from_slice(&ts);
        token.extend_from_slice(&mac.finalize().into_bytes());
        hex::encode(token)
    }

    /// Check a bearer token for `role`. Returns `false` for malformed,
    /// mis-signed, or expired tokens; never panics on garbage input.
    #[must_use]
    pub fn verify(&self, token: &str, role: &str) -> bool {
        let Ok(bytes) = hex::decode(token) else {
            return false;
        };
        if bytes.len() != TIMESTAMP_LEN + MAC_LEN {
            return false;
        }

        let (ts_bytes, claimed_mac) = bytes.split_at(TIMESTAMP_LEN);
        let timestamp_ms = u64::from_be_bytes(ts_bytes.try_into().expect("split at 8"));

        let now = now_ms();
        let expiry_ms = self.token_expiry.as_millis() as u64;
        if timestamp_ms > now + MAX_FUTURE_SKEW.as_millis() as u64 {
            return false;
        }
        if now.saturating_sub(timestamp_ms) > expiry_ms {
            return false;
        }

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(role.as_bytes());
        mac.update(ts_bytes);
        mac.verify_slice(claimed_mac).is_ok()
    }

    /// Extract and check the token from an `Authorization` header value.
    #[must_use]
    pub fn verify_header(&self, header: Option<&str>, role: &str) -> bool {
        match header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => self.verify(token.trim(), role),
            None => false,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let auth = AdminAuth::new("secret");
        let token = auth.create_token("admin");

        assert!(auth.verify(&token, "admin"));
    }

    #[test]
    fn test_wrong_role_rejected() {
        let auth = AdminAuth::new("secret");
        let token = auth.create_token("viewer");

        assert!(!auth.verify(&token, "admin"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = AdminAuth::new("secret-a");
        let verifier = AdminAuth::new("secret-b");

        let token = issuer.create_token("admin");
        assert!(!verifier.verify(&token, "admin"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = AdminAuth::new("secret").with_expiry(Duration::from_secs(60));

        let old = now_ms() - 120_000;
        let token = auth.token_at("admin", old);

        assert!(!auth.verify(&token, "admin"));
    }

    #[test]
    fn test_far_future_token_rejected() {
        let auth = AdminAuth::new("secret");

        let future = now_ms() + 3_600_000;
        let token = auth.token_at("admin", future);

        assert!(!auth.verify(&token, "admin"));
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let auth = AdminAuth::new("secret");

        assert!(!auth.verify("", "admin"));
        assert!(!auth.verify("zz-not-hex", "admin"));
        assert!(!auth.verify("deadbeef", "admin")); // too short
    }

    #[test]
    fn test_header_parsing() {
        let auth = AdminAuth::new("secret");
        let token = auth.create_token("admin");

        assert!(auth.verify_header(Some(&format!("Bearer {}", token)), "admin"));
        assert!(!auth.verify_header(Some(&token), "admin")); // no scheme
        assert!(!auth.verify_header(None, "admin"));
    }
}
