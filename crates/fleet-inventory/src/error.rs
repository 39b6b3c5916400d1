//! Inventory errors.
//!
//! redb reports a different error type per operation (open, transaction,
//! table, storage, commit). Callers of the inventory never branch on which
//! of those failed, so they all fold into [`InventoryError::Storage`] and
//! the store can use plain `?`.

use thiserror::Error;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// The backing database failed.
    #[error("inventory storage failed: {0}")]
    Storage(#[source] redb::Error),

    /// A non-database inventory backend could not serve the request.
    #[error("inventory unavailable: {0}")]
    Unavailable(String),

    #[error("cannot encode record for instance {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored record no longer decodes as an [`Instance`](crate::Instance).
    #[error("corrupt record for instance {name}: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The record was removed between listing and write-back.
    #[error("instance {0} not found")]
    NotFound(String),
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

macro_rules! storage_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for InventoryError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.into())
                }
            }
        )*
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
