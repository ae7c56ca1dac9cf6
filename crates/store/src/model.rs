//! Row types for the four shop relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartId, CartItemId, CustomerId, Money, ProductId};

/// A catalog product and its available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Units available for carts. Never negative.
    pub stock_quantity: i64,
}

/// Fields for inserting a product into the catalog.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i64,
}

impl NewProduct {
    /// Creates a product definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        stock_quantity: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            stock_quantity,
        }
    }
}

/// A named cart. `(customer_id, cart_name)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub cart_name: String,
}

/// A cart line item. `(cart_id, product_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    /// Always positive.
    pub quantity: i64,
}

/// A cart item joined with the product's current name and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product_name: String,
    pub price: Money,
}

/// A customer account, including its password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    /// PHC-formatted password hash.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a customer account.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub password_hash: String,
}

/// Catalog search filters. Omitted filters impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Substring match on the product description.
    pub description: Option<String>,

    /// Inclusive lower price bound.
    pub min_price: Option<Money>,

    /// Inclusive upper price bound.
    pub max_price: Option<Money>,
}

impl ProductFilter {
    /// Creates a filter that matches every product.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to descriptions containing `text`.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Restricts to prices at or above `price`.
    pub fn min_price(mut self, price: Money) -> Self {
        self.min_price = Some(price);
        self
    }

    /// Restricts to prices at or below `price`.
    pub fn max_price(mut self, price: Money) -> Self {
        self.max_price = Some(price);
        self
    }

    /// Returns true if `product` satisfies every supplied filter.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref text) = self.description
            && !product.description.contains(text.as_str())
        {
            return false;
        }
        if let Some(min) = self.min_price
            && product.price < min
        {
            return false;
        }
        if let Some(max) = self.max_price
            && product.price > max
        {
            return false;
        }
        true
    }
}
