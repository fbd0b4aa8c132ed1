// Security - credential hashing and bearer token issuance
// Argon2id encoded hashes for passwords, HS256 JWTs for session-less auth

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::AuthConfig;
use crate::core::{current_time_millis, UserId};
use crate::error::{AppError, AppResult};

/// JWT Claims for authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub jti: String, // Token ID, used for revocation
    pub iat: u64,    // Issued at (seconds)
    pub exp: u64,    // Expires at (seconds)
}

impl Claims {
    pub fn user_id(&self) -> AppResult<UserId> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Unauthenticated.".to_string()))
    }
}

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl From<&AuthConfig> for SecurityConfig {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            jwt_secret: auth.jwt_secret.clone(),
            jwt_expiry: Duration::from_secs(auth.token_ttl_secs),
            argon2_memory_kib: auth.argon2_memory_kib,
            argon2_iterations: auth.argon2_iterations,
        }
    }
}

impl SecurityConfig {
    /// Cheap hashing parameters for tests and local tooling.
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            jwt_expiry: Duration::from_secs(3600),
            argon2_memory_kib: 64,
            argon2_iterations: 1,
        }
    }
}

/// Argon2id parameters; memory cost in KiB.
fn hash_config(mem_cost: u32, time_cost: u32) -> argon2::Config<'static> {
    argon2::Config {
        variant: argon2::Variant::Argon2id,
        mem_cost,
        time_cost,
        lanes: 1,
        hash_length: 32,
        ..argon2::Config::default()
    }
}

/// Authentication primitives; stateless apart from key material.
pub struct SecurityService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: SecurityConfig,
}

impl SecurityService {
    pub fn new(config: SecurityConfig) -> AppResult<Self> {
        // Argon2 needs at least 8 KiB per lane.
        if config.argon2_memory_kib < 8 || config.argon2_iterations == 0 {
            return Err(AppError::Internal(format!(
                "Invalid Argon2 parameters: {} KiB, {} iterations",
                config.argon2_memory_kib, config.argon2_iterations
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config,
        })
    }

    /// Hash on the blocking pool; argon2 is deliberately slow.
    #[instrument(skip_all)]
    pub async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password = password.to_owned();
        let config = hash_config(self.config.argon2_memory_kib, self.config.argon2_iterations);

        tokio::task::spawn_blocking(move || {
            let salt: [u8; 16] = rand::rng().random();
            argon2::hash_encoded(password.as_bytes(), &salt, &config)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    #[instrument(skip_all)]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();

        tokio::task::spawn_blocking(move || argon2::verify_encoded(&password_hash, password.as_bytes()))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))
    }

    pub fn issue_token(&self, user_id: UserId) -> AppResult<IssuedToken> {
        let now = (current_time_millis() / 1000) as u64;
        let claims = Claims {
            sub: user_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.jwt_expiry.as_secs(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;

        debug!(user_id, jti = %claims.jti, "Issued bearer token");
        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and expiry. Revocation is checked by the caller.
    pub fn decode_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized("Unauthenticated.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SecurityService {
        SecurityService::new(SecurityConfig::for_tests()).unwrap()
    }

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let security = service();
        let hash = security.hash_password("correct horse").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(security.verify_password("correct horse", &hash).await.unwrap());
        assert!(!security.verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_internal_error() {
        assert!(matches!(
            service().verify_password("anything", "plaintext").await,
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_rejects_degenerate_parameters() {
        let config = SecurityConfig {
            argon2_iterations: 0,
            ..SecurityConfig::for_tests()
        };
        assert!(SecurityService::new(config).is_err());
    }

    #[test]
    fn test_token_round_trip() {
        let security = service();
        let issued = security.issue_token(42).unwrap();

        let claims = security.decode_token(&issued.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.jti, issued.claims.jti);
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let issued = service().issue_token(42).unwrap();
        let other = SecurityService::new(SecurityConfig {
            jwt_secret: "another-secret".to_string(),
            ..SecurityConfig::for_tests()
        })
        .unwrap();

        assert!(matches!(
            other.decode_token(&issued.token),
            Err(AppError::Unauthorized(_))
        ));
    }
}
