//! Websocket client for the realtime change channel.
//!
//! Speaks the Phoenix channel framing: one `phx_join` on
//! `realtime:public:<table>` asking for `postgres_changes`, a heartbeat on
//! the `phoenix` topic, and `postgres_changes` frames carrying row changes.
//! There is no reconnection: when the socket drops, the subscription ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};
use url::Url;

use bazaar_shared::constants::REMOTE_SCHEMA;
use bazaar_shared::Table;

use crate::error::Result;
use crate::events::{
    ChangeEvent, EVENT_CLOSE, EVENT_ERROR, EVENT_HEARTBEAT, EVENT_JOIN, EVENT_POSTGRES_CHANGES,
    EVENT_REPLY,
};
use crate::remote::Subscription;

/// Buffered change events per subscription.
const EVENT_BUFFER: usize = 256;

/// A Phoenix channel frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn topic_for(table: Table) -> String {
    format!("realtime:{REMOTE_SCHEMA}:{table}")
}

/// The join frame asking for every change on `table`.
pub fn join_frame(table: Table, access_token: Option<&str>, reference: u64) -> Frame {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": REMOTE_SCHEMA, "table": table.as_str() }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    Frame {
        topic: topic_for(table),
        event: EVENT_JOIN.to_string(),
        payload,
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_frame(reference: u64) -> Frame {
    Frame {
        topic: "phoenix".to_string(),
        event: EVENT_HEARTBEAT.to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// What the reader loop should do with an incoming frame.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    Change(ChangeEvent),
    Ignore,
    Close(String),
}

/// Classify one text frame received on the socket.
pub fn classify(text: &str, topic: &str) -> Incoming {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "undecodable realtime frame");
            return Incoming::Ignore;
        }
    };

    match frame.event.as_str() {
        EVENT_POSTGRES_CHANGES if frame.topic == topic => {
            match ChangeEvent::from_realtime_payload(&frame.payload) {
                Some(ev) => Incoming::Change(ev),
                None => {
                    debug!(payload = %frame.payload, "skipping change payload");
                    Incoming::Ignore
                }
            }
        }
        EVENT_REPLY => {
            if frame.payload.get("status").and_then(Value::as_str) == Some("error") {
                warn!(topic = %frame.topic, payload = %frame.payload, "realtime request rejected");
                if frame.topic == topic {
                    return Incoming::Close(format!("join rejected: {}", frame.payload));
                }
            }
            Incoming::Ignore
        }
        EVENT_ERROR | EVENT_CLOSE if frame.topic == topic => {
            Incoming::Close(format!("channel {}", frame.event))
        }
        _ => Incoming::Ignore,
    }
}

/// Connect, join the table's channel and return a subscription fed by a
/// reader task. Writer and heartbeat tasks live as long as the
/// subscription.
pub async fn subscribe(
    url: Url,
    table: Table,
    access_token: Option<String>,
    heartbeat: Duration,
) -> Result<Subscription> {
    info!(host = url.host_str().unwrap_or_default(), %table, "connecting to realtime");
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let refs = Arc::new(AtomicU64::new(1));
    let topic = topic_for(table);

    let join = join_frame(
        table,
        access_token.as_deref(),
        refs.fetch_add(1, Ordering::Relaxed),
    );
    write.send(WsMessage::Text(join.to_json()?)).await?;
    debug!(%topic, "sent join");

    let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(32);
    let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(EVENT_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let heartbeat_tx = out_tx.clone();
    let heartbeat_refs = refs.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut ticker = interval(heartbeat);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let frame = heartbeat_frame(heartbeat_refs.fetch_add(1, Ordering::Relaxed));
            let Ok(json) = frame.to_json() else { continue };
            if heartbeat_tx.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match classify(&text, &topic) {
                    Incoming::Change(ev) => {
                        if event_tx.send(ev).await.is_err() {
                            break;
                        }
                    }
                    Incoming::Ignore => {}
                    Incoming::Close(reason) => {
                        warn!(%topic, %reason, "realtime channel closed");
                        break;
                    }
                },
                Ok(WsMessage::Ping(data)) => {
                    let _ = out_tx.send(WsMessage::Pong(data)).await;
                }
                Ok(WsMessage::Close(_)) => {
                    info!(%topic, "realtime socket closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(%topic, error = %e, "realtime socket error");
                    break;
                }
            }
        }
    });

    Ok(Subscription::new(
        table,
        event_rx,
        vec![reader, heartbeat_task, writer],
    ))
}
