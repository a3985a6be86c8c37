use std::sync::Arc;

use tracing::info;

use bazaar_shared::constants::KEY_CART_ITEMS;
use bazaar_shared::{CartItem, Product, ProductId};
use bazaar_store::KeyValueStore;

use super::{forget, hydrate, write_through, Durability, SyncedStore};

/// The shopping cart, persisted under `cartItems`.
pub struct CartStore {
    kv: Arc<dyn KeyValueStore>,
    items: Vec<CartItem>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// An empty cart backed by `kv`. Call [`load`](SyncedStore::load) to
    /// hydrate it.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            items: Vec::new(),
        }
    }

    /// A cart hydrated from `kv`.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut cart = Self::new(kv);
        cart.load();
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Sum of price × quantity.
    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Add one unit of `product`, appending it if it is not in the cart yet.
    pub fn add(&mut self, product: Product) -> Durability {
        match self.items.iter().position(|item| item.id() == &product.id) {
            Some(i) => {
                let item = &mut self.items[i];
                item.quantity = item.quantity.saturating_add(1);
            }
            None => {
                info!(product_id = %product.id, "added to cart");
                self.items.push(CartItem {
                    product,
                    quantity: 1,
                });
            }
        }
        self.persist()
    }

    pub fn remove(&mut self, id: &ProductId) -> Durability {
        self.items.retain(|item| item.id() != id);
        self.persist()
    }

    /// Overwrite the quantity of `id`; zero or less removes it. Unknown ids
    /// leave the cart unchanged.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> Durability {
        if quantity <= 0 {
            return self.remove(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.iter_mut().find(|item| item.id() == id) {
            item.quantity = quantity;
        }
        self.persist()
    }

    /// Empty the cart and delete the persisted key.
    pub fn clear(&mut self) -> Durability {
        self.items.clear();
        info!("cart cleared");
        forget(self.kv.as_ref(), KEY_CART_ITEMS)
    }
}

impl SyncedStore for CartStore {
    fn key(&self) -> &'static str {
        KEY_CART_ITEMS
    }

    fn load(&mut self) {
        self.items = hydrate(self.kv.as_ref(), KEY_CART_ITEMS);
    }

    fn persist(&self) -> Durability {
        write_through(self.kv.as_ref(), KEY_CART_ITEMS, &self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_store::{Database, JsonStoreExt, MemoryStore};

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: ProductId::from(id),
            title: format!("item {id}"),
            category: "Books".into(),
            price,
            description: String::new(),
            image: String::new(),
            owner_id: None,
            created_at: None,
            rating: None,
        }
    }

    fn memory() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn add_twice_increments_quantity() {
        let kv = memory();
        let mut cart = CartStore::new(kv.clone());
        cart.add(product("p1", 10.0));
        cart.add(product("p1", 10.0));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);

        let stored: Vec<CartItem> = kv.get_json(KEY_CART_ITEMS).unwrap().unwrap();
        assert_eq!(stored[0].quantity, 2);
    }

    #[test]
    fn set_quantity_zero_removes() {
        let mut cart = CartStore::new(memory());
        cart.add(product("p1", 10.0));
        cart.add(product("p2", 5.0));

        cart.set_quantity(&ProductId::from("p1"), 0);
        assert!(cart.get(&ProductId::from("p1")).is_none());

        cart.set_quantity(&ProductId::from("p2"), 3);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total(), 15.0);

        cart.set_quantity(&ProductId::from("nope"), 4);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn quantities_saturate_instead_of_overflowing() {
        let mut cart = CartStore::new(memory());
        let id = ProductId::from("p1");
        cart.add(product("p1", 1.0));
        cart.set_quantity(&id, i64::MAX);
        assert_eq!(cart.get(&id).unwrap().quantity, u32::MAX);

        cart.add(product("p1", 1.0));
        assert_eq!(cart.get(&id).unwrap().quantity, u32::MAX);

        cart.add(product("p2", 1.0));
        cart.set_quantity(&ProductId::from("p2"), i64::MAX);
        assert_eq!(cart.item_count(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut cart = CartStore::new(memory());
        cart.add(product("p1", 1.0));
        let id = ProductId::from("p1");
        cart.remove(&id);
        let before = cart.items().to_vec();
        cart.remove(&id);
        assert_eq!(cart.items(), before.as_slice());
    }

    #[test]
    fn clear_then_reload_is_empty() {
        let kv = memory();
        let mut cart = CartStore::new(kv.clone());
        cart.add(product("p1", 1.0));
        assert!(cart.clear().is_persisted());
        assert!(!kv.contains(KEY_CART_ITEMS));

        let reloaded = CartStore::open(kv);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn failed_write_keeps_memory_state() {
        let kv = memory();
        let mut cart = CartStore::new(kv.clone());
        cart.add(product("p1", 1.0));

        kv.set_fail_writes(true);
        assert_eq!(cart.add(product("p2", 2.0)), Durability::MemoryOnly);
        assert_eq!(cart.items().len(), 2);

        kv.set_fail_writes(false);
        let reloaded = CartStore::open(kv);
        assert_eq!(reloaded.items().len(), 1);
    }

    #[test]
    fn survives_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Arc::new(Database::open_in(dir.path()).unwrap());
            let mut cart = CartStore::open(db);
            cart.add(product("p1", 12.5));
            cart.add(product("p1", 12.5));
        }

        let db = Arc::new(Database::open_in(dir.path()).unwrap());
        let cart = CartStore::open(db);
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.total(), 25.0);
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let kv = memory();
        kv.set_raw(KEY_CART_ITEMS, "[{\"id\":").unwrap();
        assert!(CartStore::open(kv).is_empty());
    }
}
