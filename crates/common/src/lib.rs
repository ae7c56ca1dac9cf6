//! Shared identifiers and value types used across the shop crates.

pub mod money;
pub mod types;

pub use money::{Money, MoneyParseError};
pub use types::{CartId, CartItemId, CustomerId, ProductId};
