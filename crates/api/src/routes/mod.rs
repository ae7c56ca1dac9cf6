pub mod cart;
pub mod customers;
pub mod ops;
