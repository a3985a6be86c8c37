use std::sync::Arc;

use tracing::info;

use bazaar_shared::constants::KEY_WISHLIST_ITEMS;
use bazaar_shared::{ProductId, WishlistItem};
use bazaar_store::KeyValueStore;

use super::{forget, hydrate, write_through, Durability, SyncedStore};

/// Saved products, a set keyed by product id, persisted under
/// `wishlistItems`.
pub struct WishlistStore {
    kv: Arc<dyn KeyValueStore>,
    items: Vec<WishlistItem>,
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl WishlistStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            items: Vec::new(),
        }
    }

    pub fn open(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut wishlist = Self::new(kv);
        wishlist.load();
        wishlist
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.iter().any(|p| &p.id == id)
    }

    /// Append `product` unless it is already saved.
    pub fn add(&mut self, product: WishlistItem) -> Durability {
        if !self.contains(&product.id) {
            info!(product_id = %product.id, "added to wishlist");
            self.items.push(product);
        }
        self.persist()
    }

    pub fn remove(&mut self, id: &ProductId) -> Durability {
        self.items.retain(|p| &p.id != id);
        self.persist()
    }

    /// Add `product` if absent, remove it otherwise. Returns whether it is
    /// saved afterwards.
    pub fn toggle(&mut self, product: WishlistItem) -> (bool, Durability) {
        if self.contains(&product.id) {
            let id = product.id;
            (false, self.remove(&id))
        } else {
            (true, self.add(product))
        }
    }

    pub fn clear(&mut self) -> Durability {
        self.items.clear();
        forget(self.kv.as_ref(), KEY_WISHLIST_ITEMS)
    }
}

impl SyncedStore for WishlistStore {
    fn key(&self) -> &'static str {
        KEY_WISHLIST_ITEMS
    }

    fn load(&mut self) {
        self.items = hydrate(self.kv.as_ref(), KEY_WISHLIST_ITEMS);
    }

    fn persist(&self) -> Durability {
        write_through(self.kv.as_ref(), KEY_WISHLIST_ITEMS, &self.items)
    }
}
