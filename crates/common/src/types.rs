use serde::{Deserialize, Serialize};

/// Declares an integer-backed row identifier.
///
/// Every table keys its rows by a database-assigned `BIGINT`, so the
/// identifiers share one shape and differ only in type.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Unique identifier for a customer account.
    CustomerId
);

row_id!(
    /// Unique identifier for a catalog product.
    ProductId
);

row_id!(
    /// Unique identifier for a named cart.
    CartId
);

row_id!(
    /// Unique identifier for a cart line item.
    CartItemId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_preserves_raw_value() {
        let id = ProductId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(ProductId::from(42), id);
    }

    #[test]
    fn id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&CartId::new(7)).unwrap();
        assert_eq!(json, "7");

        let id: CustomerId = serde_json::from_str("13").unwrap();
        assert_eq!(id, CustomerId::new(13));
    }

    #[test]
    fn id_display() {
        assert_eq!(CartItemId::new(5).to_string(), "5");
    }
}
