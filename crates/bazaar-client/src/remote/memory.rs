//! In-process [`Backend`]: tables as JSON rows, a toy auth service, an
//! object map standing in for storage, and realtime fan-out of every write
//! to live subscriptions. Used by tests and for offline development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use bazaar_shared::query::{Filter, Query};
use bazaar_shared::{AuthUser, Session, Table, UserId};

use crate::error::{ClientError, Result};
use crate::events::ChangeEvent;
use crate::remote::{Backend, Subscription};

const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<Table, Vec<Value>>,
    next_id: u64,
    accounts: Vec<Account>,
    session: Option<Session>,
    objects: HashMap<String, (String, Bytes)>,
    subscribers: Vec<(Table, mpsc::Sender<ChangeEvent>)>,
    fail_writes: bool,
    write_calls: HashMap<Table, usize>,
}

impl Inner {
    fn publish(&mut self, event: ChangeEvent) {
        self.subscribers.retain(|(table, tx)| {
            if *table != event.table {
                return !tx.is_closed();
            }
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%table, "subscriber lagging, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    fn check_writable(&mut self, table: Table) -> Result<()> {
        *self.write_calls.entry(table).or_default() += 1;
        if self.fail_writes {
            return Err(ClientError::Remote {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-call; the data is
        // still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed rows without going through `insert` (no events, no id
    /// assignment).
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        self.lock().tables.entry(table).or_default().extend(rows);
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Number of insert/update/delete calls made against `table`, including
    /// failed ones.
    pub fn write_calls(&self, table: Table) -> usize {
        self.lock().write_calls.get(&table).copied().unwrap_or(0)
    }

    /// Make every subsequent write fail with a 503.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Stored object bytes, keyed by `bucket/path`.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.lock()
            .objects
            .get(&format!("{bucket}/{path}"))
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        query.to_params()?;
        let inner = self.lock();
        let rows = inner.tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: Table, rows: Value) -> Result<Vec<Value>> {
        let rows = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };

        let mut inner = self.lock();
        inner.check_writable(table)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut obj) = row else {
                return Err(ClientError::Remote {
                    status: 400,
                    message: format!("insert into {table} expects objects"),
                });
            };
            if !obj.contains_key("id") {
                inner.next_id += 1;
                obj.insert("id".to_string(), Value::from(inner.next_id));
            }
            obj.entry("created_at")
                .or_insert_with(|| Value::String(now_text()));
            stored.push(Value::Object(obj));
        }

        inner
            .tables
            .entry(table)
            .or_default()
            .extend(stored.iter().cloned());
        for row in &stored {
            inner.publish(ChangeEvent::insert(table, row.clone()));
        }
        Ok(stored)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let Value::Object(patch) = patch else {
            return Err(ClientError::Remote {
                status: 400,
                message: "update expects an object".to_string(),
            });
        };

        let mut inner = self.lock();
        inner.check_writable(table)?;

        let mut updated = Vec::new();
        for row in inner.tables.entry(table).or_default().iter_mut() {
            if !matches_all(filters, row) {
                continue;
            }
            if let Value::Object(obj) = row {
                for (k, v) in &patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        for row in &updated {
            inner.publish(ChangeEvent::update(table, row.clone()));
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize> {
        let mut inner = self.lock();
        inner.check_writable(table)?;

        let rows = inner.tables.entry(table).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|row| matches_all(filters, row));
        *rows = kept;

        let count = removed.len();
        for row in removed {
            let mut old = Map::new();
            if let Some(id) = row.get("id") {
                old.insert("id".to_string(), id.clone());
            }
            inner.publish(ChangeEvent::delete(table, Value::Object(old)));
        }
        Ok(count)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(ClientError::Remote {
                status: 503,
                message: "storage unavailable".to_string(),
            });
        }
        inner
            .objects
            .insert(format!("{bucket}/{path}"), (content_type.to_string(), data));
        Ok(format!("memory://{bucket}/{path}"))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let mut inner = self.lock();
        if inner
            .accounts
            .iter()
            .any(|a| a.user.email.as_deref() == Some(email))
        {
            return Err(ClientError::Remote {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let user = AuthUser {
            id: UserId::new(Uuid::new_v4().to_string()),
            email: Some(email.to_string()),
        };
        inner.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .iter()
            .find(|a| a.user.email.as_deref() == Some(email) && a.password == password)
            .cloned()
            .ok_or_else(|| ClientError::Remote {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;

        let session = Session {
            access_token: format!("token-{}", Uuid::new_v4()),
            refresh_token: None,
            user: account.user,
        };
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.lock().session = None;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.lock().session.as_ref().map(|s| s.user.clone()))
    }

    async fn subscribe(&self, table: Table) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.lock().subscribers.push((table, tx));
        Ok(Subscription::new(table, rx, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use bazaar_shared::query::Direction;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_ids_and_notifies_subscribers() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe(Table::Messages).await.unwrap();
        let mut other = backend.subscribe(Table::Products).await.unwrap();

        let stored = backend
            .insert(Table::Messages, json!({"sender_id": "a", "receiver_id": "b", "content": "hi"}))
            .await
            .unwrap();
        assert_eq!(stored[0]["id"], 1);
        assert!(stored[0]["created_at"].is_string());

        let ev = sub.try_recv().unwrap();
        assert_eq!(ev.kind, ChangeKind::Insert);
        assert_eq!(ev.record.as_ref(), Some(&stored[0]));
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn select_update_delete() {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Products,
            vec![
                json!({"id": "p1", "title": "Lamp", "created_at": "2024-01-02T00:00:00Z"}),
                json!({"id": "p2", "title": "Desk", "created_at": "2024-01-03T00:00:00Z"}),
            ],
        );

        let q = Query::table(Table::Products).order_by("created_at", Direction::Descending);
        let rows = backend.select(&q).await.unwrap();
        assert_eq!(rows[0]["id"], "p2");

        let updated = backend
            .update(Table::Products, &[Filter::eq("id", "p1")], json!({"title": "Floor lamp"}))
            .await
            .unwrap();
        assert_eq!(updated[0]["title"], "Floor lamp");

        let n = backend
            .delete(Table::Products, &[Filter::eq("id", "p2")])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(backend.rows(Table::Products).len(), 1);
        assert_eq!(backend.write_calls(Table::Products), 2);
    }

    #[tokio::test]
    async fn auth_round_trip() {
        let backend = MemoryBackend::new();
        let user = backend.sign_up("a@b.co", "pw").await.unwrap();
        assert!(backend.sign_up("a@b.co", "pw").await.is_err());
        assert!(backend.sign_in("a@b.co", "wrong").await.is_err());

        let session = backend.sign_in("a@b.co", "pw").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(backend.current_user().await.unwrap(), Some(user));

        backend.sign_out().await.unwrap();
        assert_eq!(backend.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropped_subscription_stops_receiving() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe(Table::Messages).await.unwrap();
        sub.unsubscribe();
        backend
            .insert(Table::Messages, json!({"content": "x"}))
            .await
            .unwrap();
        assert!(backend.lock().subscribers.is_empty());
    }

    #[tokio::test]
    async fn failing_writes() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let err = backend
            .insert(Table::Messages, json!({"content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote { status: 503, .. }));
        assert!(backend.rows(Table::Messages).is_empty());
    }
}
