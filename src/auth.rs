//! Bearer-token authentication.
//!
//! Sessions and token issuance belong to the identity provider; this module
//! only validates the shared-secret JWT and exposes the claims handlers need
//! (buyer id plus the prefill fields echoed to the payment widget).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Buyer id.
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub exp: usize,
}

/// The authenticated buyer, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, ServiceError> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid subject claim".to_string()))?;
        Ok(Self {
            id,
            name: claims.name.unwrap_or_default(),
            email: claims.email.unwrap_or_default(),
            phone: claims.phone,
        })
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| ServiceError::Unauthorized("Invalid or expired token".to_string()))
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".to_string()))?;

        let claims = decode_token(token, &state.config.jwt_secret)?;
        AuthUser::from_claims(claims)
    }
}
