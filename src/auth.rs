use crate::config;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{
    Claims, Duration as JwtDuration, HS256Key, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use std::collections::HashSet;

/// Issues and checks bearer tokens whose subject is a user id.
#[derive(Debug, Clone)]
pub(crate) struct AuthState {
    key: HS256Key,
    issuer: String,
    token_ttl: time::Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid auth key")]
    InvalidKey,
    #[error("invalid auth token")]
    InvalidToken,
    #[error("auth token missing expiry")]
    MissingExpiry,
    #[error("auth token missing subject")]
    MissingSubject,
    #[error("failed to hash password")]
    Hash,
}

impl AuthState {
    pub(crate) fn from_config(config: &config::AppConfig) -> Result<Self, AuthError> {
        let key_bytes = decode_key(&config.auth.key)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
            issuer: config.app_name.clone(),
            token_ttl: config.auth.token_ttl,
        })
    }

    pub(crate) fn issue_token(&self, user_id: u64) -> Result<String, AuthError> {
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidToken);
        }
        let claims = Claims::create(JwtDuration::from_secs(ttl_seconds as u64))
            .with_subject(user_id.to_string())
            .with_issuer(&self.issuer);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Returns the user id carried by a valid token.
    pub(crate) fn verify_token(&self, token: &str) -> Result<u64, AuthError> {
        let mut options = VerificationOptions::default();
        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        options.allowed_issuers = Some(issuers);

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        subject
            .trim()
            .parse()
            .map_err(|_| AuthError::MissingSubject)
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|_| AuthError::Hash)?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hash)
}

pub(crate) fn verify_password(password: &str, password_hash: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    #[test]
    fn generate_auth_key_with_rng__should_match_fixture() {
        // Given
        let mut rng = ZeroRng;

        // When
        let key = generate_auth_key_with_rng(&mut rng).expect("auth key");

        // Then
        assert_eq!(key, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn verify_token__should_return_user_id() {
        // Given
        let auth = AuthState::from_config(&config::AppConfig::default()).expect("auth");

        // When
        let token = auth.issue_token(42).expect("token");

        // Then
        assert_eq!(auth.verify_token(&token).expect("verify"), 42);
        assert!(auth.verify_token("not-a-token").is_err());
    }

    #[test]
    fn verify_token__should_reject_other_issuer() {
        // Given
        let config = config::AppConfig::default();
        let auth = AuthState::from_config(&config).expect("auth");
        let other = AuthState::from_config(&config::AppConfig {
            app_name: "Other".to_string(),
            ..config
        })
        .expect("auth");

        // When
        let token = other.issue_token(1).expect("token");

        // Then
        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn hash_password__should_verify_only_matching_password() {
        let hash = hash_password("correct horse").expect("hash");

        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn from_config__should_reject_empty_key() {
        let mut config = config::AppConfig::default();
        config.auth.key = "  ".to_string();

        assert!(matches!(
            AuthState::from_config(&config),
            Err(AuthError::InvalidKey)
        ));
    }
}
