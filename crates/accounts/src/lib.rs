pub mod error;
pub mod password;
pub mod service;

pub use error::AuthError;
pub use service::{AccessService, NewAccount, Profile};
