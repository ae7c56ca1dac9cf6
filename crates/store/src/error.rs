use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row referenced by a write does not exist (foreign key violation).
    #[error("Missing referenced row: {0}")]
    MissingReference(String),

    /// A write violated a uniqueness or check constraint.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// The store could not complete the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
