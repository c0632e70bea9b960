use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use subscription_core::domain::value_objects::{
    enums::user_roles::UserRole, subscriptions::SubscriberContext,
};
use thiserror::Error;
use uuid::Uuid;

use crate::axum_http::error_responses::error_response;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub email: String,
    pub user_role: String,
    pub exp: usize,
}

/// Shared secret used to validate user access tokens.
#[derive(Clone)]
pub struct UserJwtSecret(pub Arc<str>);

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn subscriber(&self) -> SubscriberContext {
        SubscriberContext {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("invalid Authorization header format")]
    InvalidHeader,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid user id in token")]
    InvalidSubject,
    #[error("account type cannot hold a subscription")]
    UnsupportedRole,
}

pub fn validate_user_jwt(token: &str, secret: &str) -> Result<UserClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    decode::<UserClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
}

pub fn auth_user_from_header(header: Option<&str>, secret: &str) -> Result<AuthUser, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidHeader)?;

    let claims = validate_user_jwt(token, secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;
    let role = UserRole::from_str(&claims.user_role).ok_or(AuthError::UnsupportedRole)?;

    Ok(AuthUser {
        user_id,
        email: claims.email,
        role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    UserJwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = UserJwtSecret::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        auth_user_from_header(header, &secret.0).map_err(|err| {
            let status = match err {
                AuthError::UnsupportedRole => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            };
            error_response(status, err.to_string())
        })
    }
}
