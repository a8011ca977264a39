//! Time-limited upload link tokens.
//!
//! A token proves "this upload belongs to user X and was authorized before
//! time T". It is self-contained and signed, so validation needs no lookup
//! table:
//!
//! ```text
//! <user>.<expires_unix_secs>.<hex(HMAC-SHA256(secret, "<user>.<expires>"))>
//! ```
//!
//! A malformed, forged, or expired token validates to `None`. Tokens are
//! signed, not encrypted: the user id is visible to whoever holds the link.
//!
//! The registry is an ordinary value built once at startup and handed to the
//! upload backend; there is no global instance.

use crate::config::TokensConfig;
use crate::types::UserKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Issues and validates upload link tokens.
#[derive(Clone)]
pub struct TokenRegistry {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenRegistry {
    /// Create a registry signing with `secret`. Any key length is accepted.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
        Self { mac, ttl }
    }

    /// Build from config. Without a configured secret a random one is
    /// generated, which means tokens do not survive a restart.
    pub fn from_config(config: &TokensConfig) -> Self {
        match config.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Self::new(secret.as_bytes(), config.ttl()),
            None => {
                warn!("tokens.secret not set; using an ephemeral signing key");
                let secret = uuid::Uuid::new_v4();
                Self::new(secret.as_bytes(), config.ttl())
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`, valid for the registry's TTL from now.
    pub fn issue(&self, user: UserKey) -> String {
        self.issue_at(user, SystemTime::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user: UserKey, now: SystemTime) -> String {
        // Huge TTLs pin the expiry at u64::MAX instead of wrapping
        let expires = unix_secs(now).saturating_add(self.ttl.as_secs());
        let payload = format!("{user}.{expires}");
        let signature = hex::encode(self.sign(payload.as_bytes()));
        debug!(%user, expires, "issued upload token");
        format!("{payload}.{signature}")
    }

    /// Resolve a token to its user, or `None` if it is invalid or expired.
    pub fn validate(&self, token: &str) -> Option<UserKey> {
        self.validate_at(token, SystemTime::now())
    }

    pub fn validate_at(&self, token: &str, now: SystemTime) -> Option<UserKey> {
        self.decode(token, now).map(|(user, _)| user)
    }

    /// Time left before `token` expires, or `None` if it is already invalid.
    pub fn remaining(&self, token: &str) -> Option<Duration> {
        self.remaining_at(token, SystemTime::now())
    }

    pub fn remaining_at(&self, token: &str, now: SystemTime) -> Option<Duration> {
        self.decode(token, now)
            .map(|(_, expires)| Duration::from_secs(expires - unix_secs(now)))
    }

    fn decode(&self, token: &str, now: SystemTime) -> Option<(UserKey, u64)> {
        let (payload, signature) = token.rsplit_once('.')?;
        let (user, expires) = payload.split_once('.')?;
        let user: UserKey = user.parse().ok()?;
        let expires: u64 = expires.parse().ok()?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("rejected token with bad signature");
            return None;
        }
        if expires <= unix_secs(now) {
            debug!(%user, expires, "rejected expired token");
            return None;
        }
        Some((user, expires))
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn registry() -> TokenRegistry {
        TokenRegistry::new(b"test-secret", HOUR)
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn issued_token_validates() {
        let reg = registry();
        let token = reg.issue_at(UserKey(42), at(1_000));
        assert_eq!(reg.validate_at(&token, at(1_000)), Some(UserKey(42)));
        assert_eq!(reg.validate_at(&token, at(4_599)), Some(UserKey(42)));
    }

    #[test]
    fn token_expires_after_ttl() {
        let reg = registry();
        let token = reg.issue_at(UserKey(42), at(1_000));
        assert_eq!(reg.validate_at(&token, at(4_600)), None);
        assert_eq!(reg.validate_at(&token, at(10_000)), None);
    }

    #[test]
    fn negative_user_ids_round_trip() {
        let reg = registry();
        let token = reg.issue_at(UserKey(-100_200), at(0));
        assert_eq!(reg.validate_at(&token, at(1)), Some(UserKey(-100_200)));
    }

    #[test]
    fn remaining_counts_down() {
        let reg = registry();
        let token = reg.issue_at(UserKey(1), at(1_000));
        assert_eq!(
            reg.remaining_at(&token, at(1_600)),
            Some(Duration::from_secs(3_000))
        );
        assert_eq!(reg.remaining_at(&token, at(5_000)), None);
    }

    #[test]
    fn huge_ttl_does_not_wrap_expiry() {
        let reg = TokenRegistry::new(b"test-secret", Duration::MAX);
        let token = reg.issue_at(UserKey(1), at(1_000));
        assert!(token.starts_with(&format!("1.{}.", u64::MAX)));
        assert_eq!(reg.validate_at(&token, at(1_001)), Some(UserKey(1)));
        assert!(reg.remaining_at(&token, at(1_001)).is_some());
    }

    #[test]
    fn tampered_user_rejected() {
        let reg = registry();
        let token = reg.issue_at(UserKey(42), at(0));
        let forged = token.replacen("42", "43", 1);
        assert_eq!(reg.validate_at(&forged, at(1)), None);
    }

    #[test]
    fn tampered_expiry_rejected() {
        let reg = registry();
        let token = reg.issue_at(UserKey(42), at(0));
        let forged = token.replacen(".3600.", ".999999.", 1);
        assert_ne!(forged, token);
        assert_eq!(reg.validate_at(&forged, at(4_000)), None);
    }

    #[test]
    fn other_secret_rejected() {
        let token = registry().issue_at(UserKey(42), at(0));
        let other = TokenRegistry::new(b"another-secret", HOUR);
        assert_eq!(other.validate_at(&token, at(1)), None);
    }

    #[test]
    fn malformed_tokens_rejected() {
        let reg = registry();
        for token in ["", "abc", "1.2", "1.2.zz", "x.100.00", "1.y.00", "..."] {
            assert_eq!(reg.validate_at(token, at(0)), None, "token {token:?}");
        }
    }

    #[test]
    fn ephemeral_registry_still_round_trips() {
        let reg = TokenRegistry::from_config(&TokensConfig::default());
        let token = reg.issue(UserKey(5));
        assert_eq!(reg.validate(&token), Some(UserKey(5)));
        assert_eq!(reg.ttl(), HOUR);
    }

    #[test]
    fn empty_secret_is_treated_as_missing() {
        let config = TokensConfig {
            secret: Some(String::new()),
            ttl_secs: 60,
        };
        let a = TokenRegistry::from_config(&config);
        let b = TokenRegistry::from_config(&config);
        let token = a.issue(UserKey(5));
        assert_eq!(b.validate(&token), None);
    }
}
