//! Cart commands.

use common::{CustomerId, ProductId};

use crate::error::CartError;

/// Longest accepted cart name, in characters.
pub const MAX_CART_NAME_LEN: usize = 100;

/// Command to add a quantity of a product to a customer's named cart.
///
/// Only constructible through [`AddToCart::new`], so a value always holds a
/// positive quantity and a usable cart name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCart {
    customer_id: CustomerId,
    cart_name: String,
    product_id: ProductId,
    quantity: i64,
}

impl AddToCart {
    /// Creates a new AddToCart command.
    pub fn new(
        customer_id: CustomerId,
        cart_name: impl Into<String>,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Self, CartError> {
        let cart_name = cart_name.into().trim().to_string();

        if quantity < 1 {
            return Err(CartError::Validation(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }
        if cart_name.is_empty() {
            return Err(CartError::Validation("cart name must not be empty".into()));
        }
        if cart_name.chars().count() > MAX_CART_NAME_LEN {
            return Err(CartError::Validation(format!(
                "cart name must be at most {MAX_CART_NAME_LEN} characters"
            )));
        }

        Ok(Self {
            customer_id,
            cart_name,
            product_id,
            quantity,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn cart_name(&self) -> &str {
        &self.cart_name
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }
}
