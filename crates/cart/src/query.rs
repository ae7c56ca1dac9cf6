//! Read-only views over committed catalog and cart state.

use common::CustomerId;
use store::{Cart, CartLine, Product, ProductFilter, Store};

use crate::error::CartError;

/// A cart with its line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContents {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
}

/// Catalog search and cart listings.
#[derive(Clone)]
pub struct QueryService<S: Store> {
    store: S,
}

impl<S: Store> QueryService<S> {
    /// Creates a new query service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns products matching every supplied filter.
    #[tracing::instrument(skip(self))]
    pub async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CartError> {
        Ok(self.store.search_products(filter).await?)
    }

    /// Returns a customer's named cart and its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart_items(
        &self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<CartContents, CartError> {
        let cart = self
            .store
            .find_cart(customer_id, cart_name)
            .await?
            .ok_or_else(|| CartError::CartNotFound {
                customer_id,
                cart_name: cart_name.to_string(),
            })?;
        let lines = self.store.cart_lines(cart.id).await?;

        Ok(CartContents { cart, lines })
    }
}
