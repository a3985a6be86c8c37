//! Write-through stores mirrored into the local key-value store.
//!
//! Each store owns an in-memory list (or record) and persists it under one
//! key after every mutation. A failed write is logged and swallowed: the
//! in-memory change stands and the mutation reports
//! [`Durability::MemoryOnly`].

pub mod cart;
pub mod profile;
pub mod wishlist;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use bazaar_store::{JsonStoreExt, KeyValueStore};

pub use cart::CartStore;
pub use profile::ProfileStore;
pub use wishlist::WishlistStore;

/// Whether a mutation reached the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Persisted,
    /// The in-memory state changed but the write failed; the change is lost
    /// on restart.
    MemoryOnly,
}

impl Durability {
    pub fn is_persisted(self) -> bool {
        self == Self::Persisted
    }

    /// Persisted only if both writes were.
    pub fn and(self, other: Durability) -> Durability {
        if self.is_persisted() && other.is_persisted() {
            Self::Persisted
        } else {
            Self::MemoryOnly
        }
    }
}

/// Common shape of the synchronized stores.
pub trait SyncedStore {
    /// Local store key holding this store's blob.
    fn key(&self) -> &'static str;

    /// Replace the in-memory state with what is persisted.
    fn load(&mut self);

    /// Write the in-memory state to the local store.
    fn persist(&self) -> Durability;
}

/// Read `key`, treating a missing entry and an undecodable one alike as
/// the default value.
pub(crate) fn hydrate<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &str) -> T {
    match kv.get_json::<T>(key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!(key, "nothing persisted");
            T::default()
        }
        Err(e) => {
            error!(key, error = %e, "failed to load persisted state");
            T::default()
        }
    }
}

pub(crate) fn write_through<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Durability {
    match kv.set_json(key, value) {
        Ok(()) => Durability::Persisted,
        Err(e) => {
            error!(key, error = %e, "failed to persist state");
            Durability::MemoryOnly
        }
    }
}

pub(crate) fn forget(kv: &dyn KeyValueStore, key: &str) -> Durability {
    match kv.remove(key) {
        Ok(_) => Durability::Persisted,
        Err(e) => {
            error!(key, error = %e, "failed to remove persisted state");
            Durability::MemoryOnly
        }
    }
}
