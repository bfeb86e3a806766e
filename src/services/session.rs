// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session credentials: signed HS256 JWTs with a fixed 7-day lifetime.

use crate::db::IdentityStore;
use crate::error::{StoreError, ValidationError};
use crate::models::User;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session credential lifetime.
pub const SESSION_TTL_DAYS: i64 = 7;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (local user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// A freshly minted session credential.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates session credentials with a process-wide key.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(signing_key: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Issue a credential for `user_id`, valid for seven days from now.
    pub fn issue(&self, user_id: &str) -> anyhow::Result<SessionCredential> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a credential as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        user_id: &str,
        issued_at: DateTime<Utc>,
    ) -> anyhow::Result<SessionCredential> {
        // Whole seconds, so the returned timestamps match the claims exactly.
        let issued_at = Utc
            .timestamp_opt(issued_at.timestamp(), 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("Invalid issue time"))?;
        let expires_at = issued_at + self.ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SessionCredential {
            token,
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the subject user id.
    pub fn validate(&self, token: &str) -> Result<String, ValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => ValidationError::Expired,
                ErrorKind::InvalidSignature => ValidationError::BadSignature,
                other => ValidationError::Malformed(format!("{:?}", other)),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(ValidationError::Malformed("empty subject".to_string()));
        }

        Ok(data.claims.sub)
    }

    /// Session continuity stores only the user id.
    pub fn serialize_for_session(&self, user: &User) -> String {
        user.id.clone()
    }

    /// Re-fetch the full user for a session id.
    ///
    /// `Ok(None)` means the user no longer exists; callers treat the session
    /// as anonymous rather than failing the request.
    pub async fn deserialize_from_session(
        &self,
        store: &dyn IdentityStore,
        user_id: &str,
    ) -> Result<Option<User>, StoreError> {
        store.get_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_sets_seven_day_expiry() {
        let issuer = SessionIssuer::new(b"test_signing_key_32_bytes_long!!");
        let credential = issuer.issue("user-1").unwrap();

        assert_eq!(credential.subject, "user-1");
        assert_eq!(
            credential.expires_at - credential.issued_at,
            Duration::days(7)
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let issuer = SessionIssuer::new(b"test_signing_key_32_bytes_long!!");
        assert!(matches!(
            issuer.validate("not.a.jwt"),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn other_key_is_bad_signature() {
        let issuer = SessionIssuer::new(b"test_signing_key_32_bytes_long!!");
        let other = SessionIssuer::new(b"another_signing_key_32_bytes!!!!");
        let credential = other.issue("user-1").unwrap();

        assert_eq!(
            issuer.validate(&credential.token),
            Err(ValidationError::BadSignature)
        );
    }
}
