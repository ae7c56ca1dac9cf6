//! API error types with HTTP response mapping.

use accounts::AuthError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Missing or unusable caller identity.
    #[error("{0}")]
    Unauthorized(String),
    /// Cart engine or query error.
    #[error(transparent)]
    Cart(#[from] CartError),
    /// Authentication or profile error.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Cart(err) => match err {
                CartError::Validation(_) | CartError::InsufficientStock { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CartError::ProductNotFound(_)
                | CartError::CartNotFound { .. }
                | CartError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
                CartError::ConflictRetryExhausted { .. } | CartError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Auth(err) if !err.is_client_error() => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
                AuthError::CustomerAlreadyExists => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::{CustomerId, ProductId};
    use store::StoreError;

    use super::*;

    #[test]
    fn cart_errors_map_to_statuses() {
        let cases = [
            (CartError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                CartError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: 3,
                    available: 2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (CartError::ProductNotFound(ProductId::new(1)), StatusCode::NOT_FOUND),
            (
                CartError::ConflictRetryExhausted {
                    key: "cart".into(),
                    attempts: 3,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::CustomerNotFound(CustomerId::new(1))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::CustomerAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::Validation("email".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn auth_server_errors_map_to_500() {
        for err in [
            AuthError::PasswordHash,
            AuthError::Store(StoreError::Unavailable("pool closed".into())),
        ] {
            assert!(!err.is_client_error());
            assert_eq!(
                ApiError::from(err).status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let err = ApiError::from(CartError::Store(StoreError::Unavailable(
            "connection refused to 10.0.0.5".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
