use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    routes::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Expiration timestamp
    pub exp: usize,
}

/// Issues and checks bearer tokens and password hashes
pub struct AuthService {
    secret: String,
    token_ttl_secs: u64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(secret: String, token_ttl_secs: u64, bcrypt_cost: u32) -> Self {
        Self {
            secret,
            token_ttl_secs,
            bcrypt_cost,
        }
    }

    pub fn generate_token(&self, user_id: Uuid) -> AppResult<String> {
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| (d.as_secs() + self.token_ttl_secs) as usize)
            .map_err(|e| AppError::Internal(format!("Time error: {}", e)))?;

        let claims = Claims {
            sub: user_id,
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("JWT encoding error: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing error: {}", e)))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

/// The authenticated caller, taken from the `Authorization: Bearer` header
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.auth.validate_token(token)?;
        Ok(CurrentUser { id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret".into(), 3600, 4)
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service();
        let user_id = Uuid::new_v4();
        let token = auth.generate_token(user_id).unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = service().generate_token(Uuid::new_v4()).unwrap();
        let other = AuthService::new("other-secret".into(), 3600, 4);
        assert!(matches!(
            other.validate_token(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        tokio_test::assert_err!(service().validate_token("not.a.token"));
        tokio_test::assert_err!(service().validate_token(""));
    }

    #[test]
    fn test_password_hash_and_verify() {
        let auth = service();
        let hash = tokio_test::assert_ok!(auth.hash_password("hunter22"));
        assert!(auth.verify_password("hunter22", &hash));
        assert!(!auth.verify_password("hunter23", &hash));
        assert!(!auth.verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            service().hash_password("abc"),
            Err(AppError::InvalidInput(_))
        ));
    }
}
