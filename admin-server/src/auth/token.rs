//! JWT token service
//!
//! Issues and verifies HS256 access tokens. Every token carries a unique
//! session id (`sid`) so that a single login can be revoked without
//! invalidating the signing secret.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shared::{AppError, AppResult};

use super::revocation::RevocationStore;

/// JWT claims stored in the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (subject)
    pub sub: String,
    /// Session ID, unique per issued token
    pub sid: String,
    /// Issued at (Unix timestamp seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
}

impl Claims {
    /// Parse the subject as a user id
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::invalid_token("Malformed subject claim"))
    }

    /// Seconds until this token expires (never negative)
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// A freshly issued token and its metadata
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub session_id: String,
    /// Expiration (Unix timestamp seconds)
    pub expires_at: i64,
}

/// JWT token service with session revocation
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_minutes: i64,
    revocation: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(
        secret: &str,
        expiration_minutes: i64,
        revocation: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_minutes,
            revocation,
        }
    }

    /// Issue a new access token for a user
    pub fn issue(&self, user_id: i64) -> AppResult<IssuedToken> {
        let now = Utc::now().timestamp();
        self.issue_at(user_id, now)
    }

    fn issue_at(&self, user_id: i64, iat: i64) -> AppResult<IssuedToken> {
        let exp = iat + self.expiration_minutes * 60;
        let claims = Claims {
            sub: user_id.to_string(),
            sid: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Token generation failed: {e}")))?;

        Ok(IssuedToken {
            token,
            session_id: claims.sid,
            expires_at: exp,
        })
    }

    /// Verify signature and expiry, then check the session against the
    /// revocation store
    pub async fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        let data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::token_expired(),
                    ErrorKind::InvalidSignature => AppError::invalid_token("Invalid signature"),
                    _ => AppError::invalid_token("Malformed token"),
                }
            })?;

        if self.revocation.is_revoked(&data.claims.sid).await? {
            return Err(AppError::session_revoked());
        }

        Ok(data.claims)
    }

    /// Revoke the session behind a verified token
    ///
    /// The revocation entry lives only as long as the token itself would.
    pub async fn revoke(&self, claims: &Claims) -> AppResult<()> {
        let ttl = Duration::from_secs(claims.remaining_secs() as u64);
        self.revocation.revoke(&claims.sid, ttl).await
    }

    /// Extract bearer token from an Authorization header value
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryRevocationStore;
    use shared::ErrorCode;

    fn service() -> TokenService {
        TokenService::new(
            "test-secret-that-is-long-enough-0123",
            60,
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let svc = service();
        let issued = svc.issue(42).unwrap();

        let claims = svc.verify(&issued.token).await.unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.sid, issued.session_id);
        assert!(claims.remaining_secs() > 3500);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let svc = service();
        let a = svc.issue(1).unwrap();
        let b = svc.issue(1).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let svc = service();
        // Issued far enough in the past that it is already expired
        let issued = svc.issue_at(42, Utc::now().timestamp() - 7200).unwrap();

        let err = svc.verify(&issued.token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let svc = service();
        let other = TokenService::new(
            "another-secret-that-is-long-enough-1",
            60,
            Arc::new(MemoryRevocationStore::new()),
        );
        let issued = other.issue(42).unwrap();

        let err = svc.verify(&issued.token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let svc = service();
        let err = svc.verify("not.a.jwt").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[tokio::test]
    async fn test_revoked_session_rejected() {
        let svc = service();
        let issued = svc.issue(42).unwrap();
        let claims = svc.verify(&issued.token).await.unwrap();

        svc.revoke(&claims).await.unwrap();

        let err = svc.verify(&issued.token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionRevoked);
    }

    #[tokio::test]
    async fn test_revocation_is_per_session() {
        let svc = service();
        let a = svc.issue(42).unwrap();
        let b = svc.issue(42).unwrap();

        let claims_a = svc.verify(&a.token).await.unwrap();
        svc.revoke(&claims_a).await.unwrap();

        // Same user, other session still valid
        assert!(svc.verify(&b.token).await.is_ok());
    }
}
