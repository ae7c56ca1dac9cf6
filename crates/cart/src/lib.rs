//! Cart layer for the shop backend.
//!
//! This crate provides:
//! - `CartMutationEngine`, the atomic add-to-cart unit of work
//! - `QueryService` for catalog search and cart listings
//! - `CartError`, the error taxonomy shared by both

pub mod command;
pub mod engine;
pub mod error;
pub mod query;

mod find_or_create;

pub use command::AddToCart;
pub use engine::{AddToCartOutcome, CartMutationEngine};
pub use error::CartError;
pub use query::{CartContents, QueryService};
