//! # bazaar-store
//!
//! Local persisted storage for the Bazaar client, backed by SQLite.
//!
//! The store is a string-keyed table of JSON blobs (`cartItems`,
//! `wishlistItems`, `userData`, ...). [`Database`] exposes it through the
//! [`KeyValueStore`] trait so the client's synchronized stores can also run
//! against the in-memory [`MemoryStore`].

pub mod database;
pub mod kv;
pub mod memory;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use kv::{JsonStoreExt, KeyValueStore};
pub use memory::MemoryStore;
