use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every synchronous entry point.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error description.
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// Product or variant deactivated. User-facing message names the item.
    #[error("{0}")]
    Unavailable(String),

    /// Requested quantity exceeds live stock. User-facing message names the
    /// item and the quantity remaining.
    #[error("{0}")]
    InsufficientStock(String),

    /// Payment or webhook HMAC mismatch.
    #[error("{0}")]
    SignatureInvalid(String),

    /// Third-party payment API failure; message carries the raw gateway
    /// payload for diagnostics.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_)
            | Self::Unavailable(_)
            | Self::InsufficientStock(_)
            | Self::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message suitable for HTTP responses. Internal failures return generic
    /// text so implementation details never leak to clients.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.response_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unavailable("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::SignatureInvalid("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Gateway("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        assert_eq!(
            ServiceError::Internal("secret pool state".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::Database(sea_orm::error::DbErr::Custom("dsn".into()))
                .response_message(),
            "Database error"
        );
        // User-facing errors keep the actual message.
        assert_eq!(
            ServiceError::InsufficientStock("Oxford Shirt (Blue, M) has only 2 left".into())
                .response_message(),
            "Oxford Shirt (Blue, M) has only 2 left"
        );
    }

    #[tokio::test]
    async fn error_body_is_single_error_field() {
        let response = ServiceError::Validation("Cart is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Cart is empty");
    }
}
