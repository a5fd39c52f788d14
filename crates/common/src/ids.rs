use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier wraps a UUID to provide type safety and prevent mixing up
/// invoice IDs with product IDs, owner IDs, and so on.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from its hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// The user (tenant) that owns invoices, products, payments and expenses.
    OwnerId
);
uuid_id!(
    /// Identifier of a purchase or sale invoice.
    InvoiceId
);
uuid_id!(
    /// Identifier of a persisted invoice line item.
    ItemId
);
uuid_id!(
    /// Identifier of a product in the catalog.
    ProductId
);
uuid_id!(
    /// Identifier of a supplier.
    SupplierId
);
uuid_id!(
    /// Identifier of a payment ledger entry.
    PaymentId
);
uuid_id!(
    /// Identifier of an expense.
    ExpenseId
);
