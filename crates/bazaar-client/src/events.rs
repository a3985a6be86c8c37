//! Row-level change notifications delivered by the realtime channel.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_shared::Table;

/// Realtime event name carrying row changes.
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change on a subscribed table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// New row (insert/update).
    pub record: Option<Value>,
    /// Previous row (update/delete); often only the primary key.
    pub old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    #[serde(rename = "type", alias = "eventType")]
    kind: ChangeKind,
    table: String,
    #[serde(default, alias = "new")]
    record: Option<Value>,
    #[serde(default, alias = "old")]
    old_record: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(table: Table, record: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            record: Some(record),
            old_record: None,
        }
    }

    pub fn update(table: Table, record: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            record: Some(record),
            old_record: None,
        }
    }

    pub fn delete(table: Table, old_record: Value) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            record: None,
            old_record: Some(old_record),
        }
    }

    /// Decode the payload of a `postgres_changes` frame. The change sits
    /// under `data` in current protocol versions and at the top level in
    /// older ones. Unknown tables and malformed payloads yield `None`.
    pub fn from_realtime_payload(payload: &Value) -> Option<Self> {
        let body = payload.get("data").unwrap_or(payload);
        let raw: RawChange = serde_json::from_value(body.clone()).ok()?;
        let table = raw.table.parse().ok()?;
        Some(Self {
            table,
            kind: raw.kind,
            record: raw.record.filter(|r| !r.is_null()),
            old_record: raw.old_record.filter(|r| !r.is_null()),
        })
    }

    /// Decode the new row as `T`.
    pub fn record_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.record
            .as_ref()
            .and_then(|r| serde_json::from_value(r.clone()).ok())
    }

    /// Primary key of the affected row, from whichever record carries it.
    pub fn row_id(&self) -> Option<String> {
        let id = self
            .record
            .as_ref()
            .and_then(|r| r.get("id"))
            .or_else(|| self.old_record.as_ref().and_then(|r| r.get("id")))?;
        match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_nested_insert_payload() {
        let payload = json!({
            "ids": [1],
            "data": {
                "type": "INSERT",
                "schema": "public",
                "table": "messages",
                "commit_timestamp": "2024-05-01T10:00:00Z",
                "record": {"id": 9, "sender_id": "a", "receiver_id": "b", "content": "hi",
                           "created_at": "2024-05-01T10:00:00Z"},
                "old_record": null
            }
        });
        let ev = ChangeEvent::from_realtime_payload(&payload).unwrap();
        assert_eq!(ev.table, Table::Messages);
        assert_eq!(ev.kind, ChangeKind::Insert);
        assert_eq!(ev.old_record, None);
        assert_eq!(ev.row_id().as_deref(), Some("9"));

        let m: bazaar_shared::Message = ev.record_as().unwrap();
        assert_eq!(m.content, "hi");
    }

    #[test]
    fn decodes_flat_delete_payload() {
        let payload = json!({
            "eventType": "DELETE",
            "table": "messages",
            "old": {"id": "m-1"}
        });
        let ev = ChangeEvent::from_realtime_payload(&payload).unwrap();
        assert_eq!(ev.kind, ChangeKind::Delete);
        assert_eq!(ev.row_id().as_deref(), Some("m-1"));
    }

    #[test]
    fn unknown_table_is_ignored() {
        let payload = json!({"data": {"type": "INSERT", "table": "orders", "record": {}}});
        assert!(ChangeEvent::from_realtime_payload(&payload).is_none());
    }
}
