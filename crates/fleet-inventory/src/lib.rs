//! fleet-inventory — the instance inventory consumed by the reaper.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for autoscaler-managed instances. Records are JSON-serialized into
//! redb's `&[u8]` value columns and keyed by instance name.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Consumers that only need to read a
//! snapshot and write back individual records should depend on the
//! [`Inventory`] trait instead of the concrete store.

pub mod error;
pub mod inventory;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{InventoryError, InventoryResult};
pub use inventory::Inventory;
pub use store::StateStore;
pub use types::*;
