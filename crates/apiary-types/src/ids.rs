//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the economy has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient indexing in whatever store backs the
//! ledger.
//!
//! Catalog entries (colony kinds, hive tiers, missions, prizes) use small
//! integer identifiers instead, because they are authored by hand in the
//! economy configuration file.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a player ledger.
    PlayerId
}

define_id! {
    /// Unique identifier for a deposit or withdrawal transaction.
    TransactionId
}

define_id! {
    /// Unique identifier for a single flower-spending purchase event.
    ///
    /// The referral bonus processor deduplicates on this ID so that a
    /// retried purchase never cascades a bonus twice.
    PurchaseId
}

define_id! {
    /// Client-generated idempotency token attached to every mutating
    /// request. The ledger store deduplicates on it so a blind retry
    /// after a timeout cannot double-debit.
    RequestToken
}

/// Generates a newtype wrapper around a small integer catalog identifier.
macro_rules! define_catalog_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
        )]
        #[ts(export, export_to = "bindings/")]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_catalog_id! {
    /// Identifier of a bee colony kind in the producer catalog.
    ColonyKindId
}

define_catalog_id! {
    /// Identifier of a claimable mission in the mission catalog.
    MissionId
}

define_catalog_id! {
    /// Identifier of a prize entry on the spin wheel.
    PrizeId
}
