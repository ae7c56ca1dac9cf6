//! The add-to-cart unit of work.

use std::time::Instant;

use common::{CartId, CartItemId};
use store::{Store, StoreError, Transaction};

use crate::command::AddToCart;
use crate::error::CartError;
use crate::find_or_create::{CartItemKey, CartKey, Resolved, find_or_create};

/// Result of a successful add-to-cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCartOutcome {
    pub cart_id: CartId,
    pub cart_item_id: CartItemId,
    /// True if this call created the cart.
    pub cart_created: bool,
    /// True if this call created the line item rather than growing it.
    pub item_created: bool,
    /// Line item quantity after the add.
    pub quantity: i64,
    /// Product stock after the decrement.
    pub remaining_stock: i64,
}

/// Applies add-to-cart operations against a store.
///
/// Each call runs one transaction that resolves the cart, locks and checks the
/// product, resolves the line item, and decrements stock. Either every write
/// commits or none does.
#[derive(Clone)]
pub struct CartMutationEngine<S: Store> {
    store: S,
    max_attempts: u32,
}

impl<S: Store> CartMutationEngine<S> {
    /// Default number of rounds a find-or-create may take before giving up.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the find-or-create attempt limit (at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds `cmd.quantity()` units of a product to a customer's named cart.
    #[tracing::instrument(
        skip(self, cmd),
        fields(
            customer_id = %cmd.customer_id(),
            cart_name = cmd.cart_name(),
            product_id = %cmd.product_id(),
            quantity = cmd.quantity(),
        )
    )]
    pub async fn add_to_cart(&self, cmd: AddToCart) -> Result<AddToCartOutcome, CartError> {
        metrics::counter!("cart_add_total").increment(1);
        let started = Instant::now();

        let result = self.run(&cmd).await;

        metrics::histogram!("cart_add_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    cart_id = %outcome.cart_id,
                    quantity = outcome.quantity,
                    remaining_stock = outcome.remaining_stock,
                    "added to cart"
                );
            }
            Err(err) => {
                metrics::counter!("cart_add_failed_total", "reason" => err.reason()).increment(1);
                if err.is_client_error() {
                    tracing::info!(error = %err, "add to cart rejected");
                } else {
                    tracing::warn!(error = %err, "add to cart failed");
                }
            }
        }

        result
    }

    /// Runs the unit of work, rolling back explicitly on failure.
    ///
    /// If this future is dropped mid-flight the transaction's own drop rolls
    /// it back.
    async fn run(&self, cmd: &AddToCart) -> Result<AddToCartOutcome, CartError> {
        let mut tx = self.store.begin().await?;

        match self.apply(&mut tx, cmd).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut S::Tx,
        cmd: &AddToCart,
    ) -> Result<AddToCartOutcome, CartError> {
        // 1. Resolve the cart.
        let cart_key = CartKey {
            customer_id: cmd.customer_id(),
            cart_name: cmd.cart_name(),
        };
        let (cart, cart_created) = match find_or_create(tx, &cart_key, self.max_attempts)
            .await
            .map_err(|err| match err {
                CartError::Store(StoreError::MissingReference(_)) => {
                    CartError::CustomerNotFound(cmd.customer_id())
                }
                other => other,
            })? {
            Resolved::Found(cart) => (cart, false),
            Resolved::Created(cart) => (cart, true),
        };

        // 2. Resolve and lock the product.
        let product = tx
            .lock_product(cmd.product_id())
            .await?
            .ok_or(CartError::ProductNotFound(cmd.product_id()))?;

        // 3. Check stock under the product lock.
        if product.stock_quantity < cmd.quantity() {
            return Err(CartError::InsufficientStock {
                product_id: product.id,
                requested: cmd.quantity(),
                available: product.stock_quantity,
            });
        }

        // 4. Resolve the line item and accumulate.
        let item_key = CartItemKey {
            cart_id: cart.id,
            product_id: product.id,
            initial_quantity: cmd.quantity(),
        };
        let (item, item_created) = match find_or_create(tx, &item_key, self.max_attempts).await? {
            Resolved::Created(item) => (item, true),
            Resolved::Found(mut item) => {
                item.quantity = item.quantity.checked_add(cmd.quantity()).ok_or_else(|| {
                    CartError::Validation("cart item quantity out of range".to_string())
                })?;
                tx.set_cart_item_quantity(item.id, item.quantity).await?;
                (item, false)
            }
        };

        // 5. Decrement stock.
        let remaining_stock = product.stock_quantity - cmd.quantity();
        tx.set_product_stock(product.id, remaining_stock).await?;

        Ok(AddToCartOutcome {
            cart_id: cart.id,
            cart_item_id: item.id,
            cart_created,
            item_created,
            quantity: item.quantity,
            remaining_stock,
        })
    }
}
