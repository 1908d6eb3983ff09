//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are UUIDs on the wire and in storage. They are totally
//! ordered by their byte representation, which matches PostgreSQL's `uuid`
//! ordering; row locks are acquired in that order.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a business (the purchasing party and credit holder).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(Uuid);

/// Identifier of a product in a business's catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

/// Identifier of a posted order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

/// Client-supplied token deduplicating retried purchase requests.
///
/// Scoped to a business: the same key may be used by two different businesses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if uuid.is_nil() {
                    return Err(DomainError::invalid_id(format!("{}: nil uuid", $name)));
                }
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(BusinessId, "BusinessId");
impl_uuid_newtype!(ProductId, "ProductId");
impl_uuid_newtype!(OrderId, "OrderId");
impl_uuid_newtype!(IdempotencyKey, "IdempotencyKey");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_uuid() {
        let id: BusinessId = "7d8f8c6b-5d2f-4e0a-9c1a-1d4f2c7a3b11".parse().unwrap();
        assert_eq!(id.to_string(), "7d8f8c6b-5d2f-4e0a-9c1a-1d4f2c7a3b11");
    }

    #[test]
    fn rejects_garbage_and_nil() {
        let err = "not-a-uuid".parse::<ProductId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("ProductId")));

        let err = "00000000-0000-0000-0000-000000000000"
            .parse::<IdempotencyKey>()
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.contains("nil")));
    }

    #[test]
    fn ordering_follows_uuid_bytes() {
        let low = ProductId::from_uuid(Uuid::from_u128(1));
        let high = ProductId::from_uuid(Uuid::from_u128(u128::MAX));
        assert!(low < high);
    }

    #[test]
    fn serializes_transparently() {
        let id = OrderId::from_uuid(Uuid::from_u128(42));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", Uuid::from_u128(42)));
    }
}
