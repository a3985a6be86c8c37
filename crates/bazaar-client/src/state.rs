//! Application state shared by the flows in [`commands`](crate::commands).
//!
//! [`AppState`] owns the remote backend handle, the local store and the
//! synchronized stores built on it. Stores sit behind async mutexes so
//! flows can hold them across remote calls.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use bazaar_shared::UserId;
use bazaar_store::{Database, KeyValueStore};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::remote::{Backend, RestBackend};
use crate::sync::{CartStore, ProfileStore, WishlistStore};
use crate::telemetry;
use crate::upload::{uploader_for, ImageUploader};

/// Central application state.
pub struct AppState {
    pub config: ClientConfig,

    /// Shared handle to the hosted backend.
    pub backend: Arc<dyn Backend>,

    /// Local key-value store the synchronized stores persist into.
    pub kv: Arc<dyn KeyValueStore>,

    pub cart: Mutex<CartStore>,
    pub wishlist: Mutex<WishlistStore>,

    /// Cached profile of the signed-in user.
    pub profile: Mutex<ProfileStore>,

    /// Receives listing images, per `config.upload_mode`.
    pub uploader: Box<dyn ImageUploader>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire up state from explicit parts, hydrating the stores from `kv`.
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let uploader = uploader_for(&config, backend.clone())?;
        Ok(Self {
            cart: Mutex::new(CartStore::open(kv.clone())),
            wishlist: Mutex::new(WishlistStore::open(kv.clone())),
            profile: Mutex::new(ProfileStore::open(kv.clone())),
            config,
            backend,
            kv,
            uploader,
        })
    }

    /// Production wiring: logging, the on-disk store and the HTTP backend.
    pub fn bootstrap(config: ClientConfig) -> Result<Self> {
        telemetry::init();
        config.validate()?;

        let db = match &config.data_dir {
            Some(dir) => Database::open_in(dir)?,
            None => Database::new()?,
        };
        info!(path = ?db.path(), "local store opened");

        let backend = Arc::new(RestBackend::new(&config)?);
        Self::new(config, backend, Arc::new(db))
    }

    /// Id of the signed-in user.
    pub async fn current_user_id(&self) -> Result<UserId> {
        self.backend
            .current_user()
            .await?
            .map(|user| user.id)
            .ok_or(ClientError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;
    use crate::sync::SyncedStore;
    use bazaar_shared::constants::KEY_CART_ITEMS;

    #[tokio::test]
    async fn new_hydrates_stores_and_requires_sign_in() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(bazaar_store::MemoryStore::new());
        kv.set_raw(KEY_CART_ITEMS, r#"[{"id":"p1","title":"Lamp","category":"Furniture","price":3.5,"quantity":2}]"#)
            .unwrap();

        let state = AppState::new(
            ClientConfig::default(),
            Arc::new(MemoryBackend::new()),
            kv,
        )
        .unwrap();

        let cart = state.cart.lock().await;
        assert_eq!(cart.key(), KEY_CART_ITEMS);
        assert_eq!(cart.item_count(), 2);
        drop(cart);

        assert!(matches!(
            state.current_user_id().await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[test]
    fn bootstrap_opens_store_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let state = AppState::bootstrap(config).unwrap();
        assert!(dir.path().join("bazaar.db").exists());
        assert!(state.kv.get_raw("missing").unwrap().is_none());
    }
}
