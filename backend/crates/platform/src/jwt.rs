//! HS256 access tokens
//!
//! Access tokens are stateless; only their signature, expiry and `type`
//! claim are checked. Expiry is compared against the caller's clock instead of
//! the process wall clock so the whole credential subsystem shares one notion
//! of "now".

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Value of the `type` claim on every access token.
pub const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: Uuid,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// Game session the token is scoped to (webview launch exchange only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<Uuid>,
}

impl AccessClaims {
    pub fn new(sub: Uuid, role: impl Into<String>, issued_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            sub,
            role: role.into(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            sid: None,
        }
    }

    pub fn scoped_to_session(mut self, session_id: Uuid) -> Self {
        self.sid = Some(session_id);
        self
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("malformed or tampered token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("unexpected token type `{0}`")]
    WrongType(String),
}

/// Signing and verification keys derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(JwtError::Sign)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, JwtError> {
        let claims = decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(JwtError::Invalid)?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(JwtError::Expired);
        }
        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(JwtError::WrongType(claims.token_type));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret(b"0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_sign_and_verify() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let claims = AccessClaims::new(user, "user", now, TimeDelta::minutes(15));

        let token = keys().sign(&claims).unwrap();
        let verified = keys().verify(&token, now).unwrap();

        assert_eq!(verified.sub, user);
        assert_eq!(verified.token_type, "access");
        assert_eq!(verified.sid, None);
    }

    #[test]
    fn test_session_scope_survives_round_trip() {
        let now = Utc::now();
        let sid = Uuid::new_v4();
        let claims =
            AccessClaims::new(Uuid::new_v4(), "user", now, TimeDelta::minutes(15)).scoped_to_session(sid);

        let token = keys().sign(&claims).unwrap();
        assert_eq!(keys().verify(&token, now).unwrap().sid, Some(sid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued = Utc::now();
        let claims = AccessClaims::new(Uuid::new_v4(), "user", issued, TimeDelta::minutes(15));
        let token = keys().sign(&claims).unwrap();

        let later = issued + TimeDelta::minutes(15);
        assert!(matches!(keys().verify(&token, later), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let now = Utc::now();
        let mut claims = AccessClaims::new(Uuid::new_v4(), "user", now, TimeDelta::minutes(15));
        claims.token_type = "refresh".to_string();
        let token = keys().sign(&claims).unwrap();

        assert!(matches!(keys().verify(&token, now), Err(JwtError::WrongType(t)) if t == "refresh"));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let now = Utc::now();
        let claims = AccessClaims::new(Uuid::new_v4(), "admin", now, TimeDelta::minutes(15));
        let token = JwtKeys::from_secret(b"another-secret-another-secret!!!")
            .sign(&claims)
            .unwrap();

        assert!(matches!(keys().verify(&token, now), Err(JwtError::Invalid(_))));
    }
}
