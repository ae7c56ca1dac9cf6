//! Cart error types.

use common::{CustomerId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The customer has no cart with that name.
    #[error("Cart '{cart_name}' not found for customer {customer_id}")]
    CartNotFound {
        customer_id: CustomerId,
        cart_name: String,
    },

    /// The customer does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The product has fewer units in stock than requested.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A find-or-create race did not settle within the attempt limit.
    #[error("Could not resolve {key} after {attempts} attempts")]
    ConflictRetryExhausted { key: String, attempts: u32 },

    /// The store failed to read, write or commit.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CartError {
    /// Returns true if the caller can correct the request and retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CartError::Validation(_)
                | CartError::ProductNotFound(_)
                | CartError::CartNotFound { .. }
                | CartError::CustomerNotFound(_)
                | CartError::InsufficientStock { .. }
        )
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CartError::Validation(_) => "validation",
            CartError::ProductNotFound(_) => "product_not_found",
            CartError::CartNotFound { .. } => "cart_not_found",
            CartError::CustomerNotFound(_) => "customer_not_found",
            CartError::InsufficientStock { .. } => "insufficient_stock",
            CartError::ConflictRetryExhausted { .. } => "conflict_retry_exhausted",
            CartError::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(CartError::Validation("x".into()).is_client_error());
        assert!(CartError::ProductNotFound(ProductId::new(1)).is_client_error());
        assert!(
            CartError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 3,
                available: 2,
            }
            .is_client_error()
        );
    }

    #[test]
    fn server_errors_are_classified() {
        assert!(
            !CartError::ConflictRetryExhausted {
                key: "cart".into(),
                attempts: 3,
            }
            .is_client_error()
        );
        assert!(!CartError::Store(StoreError::Unavailable("down".into())).is_client_error());
    }
}
