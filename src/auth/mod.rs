//! # Credential Validation
//!
//! Token validation behind a seam so the gateway never knows which scheme
//! is in play. Two implementations: a constant-time shared-secret compare
//! and stateless HS256 JWT validation.

mod errors;

pub use errors::{AuthError, AuthResult};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Validates the credential presented in the realtime handshake.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, token: &str) -> AuthResult<()>;
}

/// Shared-secret validator. Comparison is constant-time.
pub struct SharedSecretValidator {
    secret: String,
}

impl SharedSecretValidator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl CredentialValidator for SharedSecretValidator {
    fn validate(&self, token: &str) -> AuthResult<()> {
        let matches: bool = token.as_bytes().ct_eq(self.secret.as_bytes()).into();
        if matches {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

/// Generate a fresh shared secret: 32 random bytes, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// JWT claims accepted by [`JwtValidator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (client identity)
    pub sub: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Stateless HS256 JWT validation: signature, expiry, and issuer. No
/// database lookup.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl CredentialValidator for JwtValidator {
    fn validate(&self, token: &str) -> AuthResult<()> {
        decode::<JwtClaims>(token, &self.key, &self.validation)
            .map(|_| ())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn shared_secret_accepts_exact_match_only() {
        let validator = SharedSecretValidator::new("s3cret");
        assert!(validator.validate("s3cret").is_ok());
        assert!(validator.validate("s3cre").is_err());
        assert!(validator.validate("s3cret!").is_err());
        assert!(validator.validate("").is_err());
    }

    #[test]
    fn generated_secrets_are_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn jwt_validator_checks_signature_and_issuer() {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: "client-1".into(),
            iat: now,
            exp: now + 900,
            iss: "arbordb".into(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"key"),
        )
        .unwrap();

        assert!(JwtValidator::new("key", "arbordb").validate(&token).is_ok());
        assert!(JwtValidator::new("other", "arbordb").validate(&token).is_err());
        assert!(JwtValidator::new("key", "someone-else")
            .validate(&token)
            .is_err());
    }

    #[test]
    fn expired_jwt_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: "client-1".into(),
            iat: now - 3600,
            exp: now - 1800,
            iss: "arbordb".into(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"key"),
        )
        .unwrap();

        assert!(JwtValidator::new("key", "arbordb").validate(&token).is_err());
    }
}
