//! The remote data client.
//!
//! [`Backend`] is the single seam between the client and the hosted
//! backend: table CRUD, object storage, password auth and realtime change
//! subscriptions. [`RestBackend`] talks to a PostgREST-style HTTP API;
//! [`MemoryBackend`] keeps everything in process.

pub mod memory;
pub mod realtime;
pub mod rest;
pub mod tables;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bazaar_shared::query::{Filter, Query};
use bazaar_shared::{AuthUser, Session, Table};

use crate::error::Result;
use crate::events::ChangeEvent;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Insert one row (object) or several (array); returns the stored rows
    /// with backend-assigned columns filled in.
    async fn insert(&self, table: Table, rows: Value) -> Result<Vec<Value>>;

    /// Apply `patch` to every row matching all `filters`; returns the
    /// updated rows.
    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    /// Delete rows matching all `filters`; returns how many went away.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize>;

    /// Store `data` at `path` in `bucket` (overwriting) and return its
    /// public URL.
    async fn upload(&self, bucket: &str, path: &str, content_type: &str, data: Bytes)
        -> Result<String>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// The signed-in user, if any.
    async fn current_user(&self) -> Result<Option<AuthUser>>;

    /// Start receiving change events for `table`.
    async fn subscribe(&self, table: Table) -> Result<Subscription>;
}

/// A live realtime subscription. Dropping it (or calling
/// [`Subscription::unsubscribe`]) tears down the background tasks feeding
/// it.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    rx: mpsc::Receiver<ChangeEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(table: Table, rx: mpsc::Receiver<ChangeEvent>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { table, rx, tasks }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Next change event; `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        tracing::debug!(table = %self.table, "unsubscribing");
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        for task in &self.tasks {
            task.abort();
        }
    }
}
