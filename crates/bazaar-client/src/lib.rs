//! # bazaar-client
//!
//! Client-side synchronization core of the Bazaar campus marketplace: the
//! remote backend seam, write-through cart/wishlist/profile stores, the
//! realtime chat synchronizer, image uploads and the user-facing flows.

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod remote;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod upload;

pub use config::{ClientConfig, UploadMode};
pub use error::{ClientError, Result};
pub use remote::{Backend, MemoryBackend, RestBackend, Subscription};
pub use state::AppState;
pub use sync::{CartStore, Durability, ProfileStore, SyncedStore, WishlistStore};
