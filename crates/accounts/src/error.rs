use common::CustomerId;
use store::StoreError;
use thiserror::Error;

/// Errors from authentication and profile operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// Email already registered.
    #[error("customer already exists")]
    CustomerAlreadyExists,

    #[error("validation error: {0}")]
    Validation(String),

    /// Hashing a password failed.
    #[error("password hashing failed")]
    PasswordHash,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns true if the caller can correct the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::PasswordHash | Self::Store(_))
    }
}
