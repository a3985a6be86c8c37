use std::sync::Arc;

use tracing::info;

use bazaar_shared::constants::{KEY_AVATAR_URI, KEY_USER_DATA};
use bazaar_shared::{ProfilePatch, UserProfile};
use bazaar_store::KeyValueStore;

use super::{forget, hydrate, write_through, Durability, SyncedStore};

/// Cached profile of the signed-in user (`userData`) plus the locally chosen
/// avatar reference (`avatarUri`).
pub struct ProfileStore {
    kv: Arc<dyn KeyValueStore>,
    profile: Option<UserProfile>,
    avatar: Option<String>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("profile", &self.profile)
            .field("avatar", &self.avatar)
            .finish_non_exhaustive()
    }
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            profile: None,
            avatar: None,
        }
    }

    pub fn open(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut store = Self::new(kv);
        store.load();
        store
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// The avatar to show: the local choice if any, else the profile's.
    pub fn avatar(&self) -> Option<&str> {
        self.avatar
            .as_deref()
            .or_else(|| self.profile.as_ref().and_then(|p| p.avatar.as_deref()))
    }

    /// Replace the cached profile.
    pub fn save(&mut self, profile: UserProfile) -> Durability {
        info!(user_id = %profile.id, "caching profile");
        self.profile = Some(profile);
        self.persist()
    }

    /// Apply `patch` to the cached profile. No-op without a cached profile.
    pub fn apply(&mut self, patch: &ProfilePatch) -> Durability {
        match self.profile.as_mut() {
            Some(profile) => {
                patch.apply_to(profile);
                self.persist()
            }
            None => Durability::Persisted,
        }
    }

    pub fn set_avatar(&mut self, uri: &str) -> Durability {
        self.avatar = Some(uri.to_string());
        write_through(self.kv.as_ref(), KEY_AVATAR_URI, uri)
    }

    /// Forget the cached profile and avatar.
    pub fn clear(&mut self) -> Durability {
        self.profile = None;
        self.avatar = None;
        forget(self.kv.as_ref(), KEY_USER_DATA).and(forget(self.kv.as_ref(), KEY_AVATAR_URI))
    }
}

impl SyncedStore for ProfileStore {
    fn key(&self) -> &'static str {
        KEY_USER_DATA
    }

    fn load(&mut self) {
        self.profile = hydrate(self.kv.as_ref(), KEY_USER_DATA);
        self.avatar = hydrate(self.kv.as_ref(), KEY_AVATAR_URI);
    }

    fn persist(&self) -> Durability {
        match &self.profile {
            Some(profile) => write_through(self.kv.as_ref(), KEY_USER_DATA, profile),
            None => forget(self.kv.as_ref(), KEY_USER_DATA),
        }
    }
}
