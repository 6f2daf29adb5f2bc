use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a registered user (customer or admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<UserId> for Uuid {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Declares a numeric identifier newtype backed by `u32`.
///
/// Products, orders and payments are keyed by small externally visible
/// numbers rather than UUIDs.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw numeric value.
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            pub const fn value(&self) -> u32 {
                self.0
            }

            /// Returns the value widened for storage in a `BIGINT` column.
            pub fn as_i64(&self) -> i64 {
                i64::from(self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = std::num::TryFromIntError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                u32::try_from(value).map(Self)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Stable external identifier of a catalog product.
    ProductId
);

numeric_id!(
    /// Sequential order number, allocated as `max + 1` at checkout.
    OrderNumber
);

numeric_id!(
    /// Six-digit payment identifier.
    PaymentId
);

impl OrderNumber {
    /// The number following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_new_creates_unique_ids() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn user_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(UserId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn numeric_ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&ProductId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: OrderNumber = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, OrderNumber::new(42));
    }

    #[test]
    fn numeric_id_rejects_negative_storage_values() {
        assert!(PaymentId::try_from(-1_i64).is_err());
        assert_eq!(PaymentId::try_from(123_456_i64).unwrap().value(), 123_456);
    }

    #[test]
    fn order_number_next_increments() {
        assert_eq!(OrderNumber::new(9).next(), OrderNumber::new(10));
    }

    #[test]
    fn product_id_parses_from_path_segment() {
        assert_eq!(" 12 ".parse::<ProductId>().unwrap(), ProductId::new(12));
        assert!("abc".parse::<ProductId>().is_err());
    }
}
