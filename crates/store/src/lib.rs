pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

mod locks;

pub use common::{CartId, CartItemId, CustomerId, Money, ProductId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{
    Cart, CartItem, CartLine, Customer, NewCustomer, NewProduct, Product, ProductFilter,
};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{Store, Transaction};
