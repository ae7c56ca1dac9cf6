//! Find-or-create over natural keys, shared by cart and cart item resolution.

use async_trait::async_trait;
use common::{CartId, CustomerId, ProductId};
use store::{Cart, CartItem, StoreError, Transaction};

use crate::error::CartError;

/// A natural key that can be looked up and lazily inserted within a
/// transaction.
#[async_trait]
pub(crate) trait NaturalKey<T: Transaction>: Send + Sync {
    type Row: Send;

    /// Metric label for this kind of key.
    const KIND: &'static str;

    /// Human-readable key, for logs and errors.
    fn describe(&self) -> String;

    /// Reads the row for this key, if one exists.
    async fn find(&self, tx: &mut T) -> Result<Option<Self::Row>, StoreError>;

    /// Inserts the row unless the key is already taken.
    async fn create(&self, tx: &mut T) -> Result<Option<Self::Row>, StoreError>;
}

/// Outcome of [`find_or_create`].
#[derive(Debug)]
pub(crate) enum Resolved<R> {
    Found(R),
    Created(R),
}

/// Resolves `key` to exactly one row.
///
/// A create that loses to a concurrent writer re-reads the winner's row.
/// Gives up with `ConflictRetryExhausted` after `max_attempts` rounds.
pub(crate) async fn find_or_create<T, K>(
    tx: &mut T,
    key: &K,
    max_attempts: u32,
) -> Result<Resolved<K::Row>, CartError>
where
    T: Transaction,
    K: NaturalKey<T>,
{
    for attempt in 1..=max_attempts {
        if let Some(row) = key.find(tx).await? {
            return Ok(Resolved::Found(row));
        }
        if let Some(row) = key.create(tx).await? {
            return Ok(Resolved::Created(row));
        }
        metrics::counter!("cart_find_or_create_retries_total", "key" => K::KIND).increment(1);
        tracing::debug!(attempt, key = %key.describe(), "lost insert race, re-reading");
    }

    Err(CartError::ConflictRetryExhausted {
        key: key.describe(),
        attempts: max_attempts,
    })
}

/// `(customer_id, cart_name)`.
pub(crate) struct CartKey<'a> {
    pub customer_id: CustomerId,
    pub cart_name: &'a str,
}

#[async_trait]
impl<'a, T: Transaction> NaturalKey<T> for CartKey<'a> {
    type Row = Cart;

    const KIND: &'static str = "cart";

    fn describe(&self) -> String {
        format!("cart '{}' of customer {}", self.cart_name, self.customer_id)
    }

    async fn find(&self, tx: &mut T) -> Result<Option<Cart>, StoreError> {
        tx.find_cart(self.customer_id, self.cart_name).await
    }

    async fn create(&self, tx: &mut T) -> Result<Option<Cart>, StoreError> {
        tx.insert_cart_if_absent(self.customer_id, self.cart_name)
            .await
    }
}

/// `(cart_id, product_id)`. A created item starts at `initial_quantity`.
pub(crate) struct CartItemKey {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub initial_quantity: i64,
}

#[async_trait]
impl<T: Transaction> NaturalKey<T> for CartItemKey {
    type Row = CartItem;

    const KIND: &'static str = "cart_item";

    fn describe(&self) -> String {
        format!("item for product {} in cart {}", self.product_id, self.cart_id)
    }

    async fn find(&self, tx: &mut T) -> Result<Option<CartItem>, StoreError> {
        tx.find_cart_item_for_update(self.cart_id, self.product_id)
            .await
    }

    async fn create(&self, tx: &mut T) -> Result<Option<CartItem>, StoreError> {
        tx.insert_cart_item_if_absent(self.cart_id, self.product_id, self.initial_quantity)
            .await
    }
}
