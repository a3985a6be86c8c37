use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use bazaar_shared::query::{Direction, Filter, Query};
use bazaar_shared::{Message, MessageId, NewMessage, Table, UserId};

use crate::chat::reducer::{reduce, ChatEntry, ChatEvent, ChatPhase, ChatState};
use crate::error::{ClientError, Result};
use crate::events::{ChangeEvent, ChangeKind};
use crate::remote::{tables, Backend, Subscription};

/// Both directions of the conversation between `a` and `b`.
pub fn conversation_filter(a: &UserId, b: &UserId) -> Filter {
    Filter::Or(vec![
        Filter::And(vec![
            Filter::eq("sender_id", a.as_str()),
            Filter::eq("receiver_id", b.as_str()),
        ]),
        Filter::And(vec![
            Filter::eq("sender_id", b.as_str()),
            Filter::eq("receiver_id", a.as_str()),
        ]),
    ])
}

/// One open conversation: history, optimistic sends and the realtime feed
/// on `messages`.
pub struct ChatSession {
    backend: Arc<dyn Backend>,
    state: ChatState,
    subscription: Option<Subscription>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("state", &self.state)
            .field("subscribed", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, me: UserId, peer: UserId) -> Self {
        Self {
            backend,
            state: ChatState::new(me, peer),
            subscription: None,
        }
    }

    pub fn phase(&self) -> ChatPhase {
        self.state.phase
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.state.entries
    }

    pub fn messages(&self) -> Vec<&Message> {
        self.state.messages().collect()
    }

    fn dispatch(&mut self, event: ChatEvent) {
        let state = std::mem::replace(
            &mut self.state,
            ChatState::new(UserId::default(), UserId::default()),
        );
        self.state = reduce(state, event);
    }

    /// Subscribe to message changes, then load the history. A failed
    /// history fetch is logged and leaves the session open.
    pub async fn open(&mut self) -> Result<()> {
        if self.state.phase == ChatPhase::Closed {
            return Err(ClientError::SubscriptionClosed);
        }
        if self.subscription.is_none() {
            self.subscription = Some(self.backend.subscribe(Table::Messages).await?);
            info!(me = %self.state.me, peer = %self.state.peer, "conversation opened");
        }
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "initial message fetch failed");
        }
        Ok(())
    }

    /// Re-fetch the whole conversation, ordered by `created_at`.
    pub async fn refresh(&mut self) -> Result<()> {
        self.dispatch(ChatEvent::FetchStarted);

        let query = Query::table(Table::Messages)
            .filter(conversation_filter(&self.state.me, &self.state.peer))
            .order_by("created_at", Direction::Ascending);

        let fetched = tables::select_as::<Message>(self.backend.as_ref(), &query).await;
        match fetched {
            Ok(messages) => {
                debug!(count = messages.len(), "messages loaded");
                self.dispatch(ChatEvent::Loaded(messages));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to fetch messages");
                self.dispatch(ChatEvent::FetchFailed);
                Err(e)
            }
        }
    }

    /// Send `text` to the peer. Whitespace-only text is ignored and yields
    /// `Ok(None)`. The message shows up as pending right away and is
    /// replaced by the stored row once the insert returns.
    pub async fn send(&mut self, text: &str) -> Result<Option<Message>> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if self.state.phase == ChatPhase::Closed {
            return Err(ClientError::SubscriptionClosed);
        }

        let temp_id = MessageId::temporary();
        let new = NewMessage {
            sender_id: self.state.me.clone(),
            receiver_id: self.state.peer.clone(),
            content: content.to_string(),
        };
        self.dispatch(ChatEvent::LocalSent(Message {
            id: temp_id.clone(),
            sender_id: new.sender_id.clone(),
            receiver_id: new.receiver_id.clone(),
            content: new.content.clone(),
            created_at: Utc::now(),
        }));

        let inserted =
            tables::insert_one::<_, Message>(self.backend.as_ref(), Table::Messages, &new).await;
        match inserted {
            Ok(stored) => {
                info!(message_id = %stored.id, "message sent");
                self.dispatch(ChatEvent::Acknowledged {
                    temp_id,
                    message: stored.clone(),
                });
                Ok(Some(stored))
            }
            Err(e) => {
                error!(error = %e, "failed to send message");
                self.dispatch(ChatEvent::SendFailed(temp_id));
                Err(e)
            }
        }
    }

    /// Apply one realtime change. Returns whether the conversation changed.
    pub fn apply_change(&mut self, change: &ChangeEvent) -> bool {
        if change.table != Table::Messages {
            return false;
        }
        let event = match change.kind {
            ChangeKind::Insert => change.record_as::<Message>().map(ChatEvent::RemoteInserted),
            ChangeKind::Update => change.record_as::<Message>().map(ChatEvent::RemoteUpdated),
            ChangeKind::Delete => change
                .row_id()
                .map(|id| ChatEvent::RemoteDeleted(MessageId::new(id))),
        };
        let Some(event) = event else {
            debug!(kind = ?change.kind, "undecodable message change");
            return false;
        };

        let before = self.state.entries.clone();
        self.dispatch(event);
        before != self.state.entries
    }

    /// Wait for the next realtime change and apply it. Returns whether the
    /// conversation changed; errors once the subscription has ended.
    pub async fn next_change(&mut self) -> Result<bool> {
        let subscription = self
            .subscription
            .as_mut()
            .ok_or(ClientError::SubscriptionClosed)?;
        let received = subscription.recv().await;
        match received {
            Some(change) => Ok(self.apply_change(&change)),
            None => {
                self.subscription = None;
                Err(ClientError::SubscriptionClosed)
            }
        }
    }

    /// Apply every change already buffered, without waiting.
    pub fn drain_changes(&mut self) -> usize {
        let mut applied = 0;
        while let Some(change) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            if self.apply_change(&change) {
                applied += 1;
            }
        }
        applied
    }

    /// Tear down the realtime subscription. Later changes are not applied.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.dispatch(ChatEvent::Closed);
        info!(peer = %self.state.peer, "conversation closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::reducer::Delivery;
    use crate::remote::MemoryBackend;
    use serde_json::json;

    fn session(backend: &Arc<MemoryBackend>) -> ChatSession {
        ChatSession::new(backend.clone(), UserId::from("u1"), UserId::from("u2"))
    }

    #[tokio::test]
    async fn open_loads_both_directions() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            Table::Messages,
            vec![
                json!({"id": 2, "sender_id": "u2", "receiver_id": "u1", "content": "yo", "created_at": "2024-05-01T10:00:02Z"}),
                json!({"id": 1, "sender_id": "u1", "receiver_id": "u2", "content": "hi", "created_at": "2024-05-01T10:00:01Z"}),
                json!({"id": 3, "sender_id": "u1", "receiver_id": "u9", "content": "no", "created_at": "2024-05-01T10:00:00Z"}),
            ],
        );

        let mut chat = session(&backend);
        assert_eq!(chat.phase(), ChatPhase::Idle);
        chat.open().await.unwrap();

        assert_eq!(chat.phase(), ChatPhase::Synced);
        let contents: Vec<_> = chat.messages().iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["hi", "yo"]);
    }

    #[tokio::test]
    async fn whitespace_send_is_ignored() {
        let backend = Arc::new(MemoryBackend::new());
        let mut chat = session(&backend);
        chat.open().await.unwrap();

        assert!(chat.send("   \n").await.unwrap().is_none());
        assert!(chat.messages().is_empty());
        assert_eq!(backend.write_calls(Table::Messages), 0);
    }

    #[tokio::test]
    async fn send_then_realtime_echo_is_one_message() {
        let backend = Arc::new(MemoryBackend::new());
        let mut chat = session(&backend);
        chat.open().await.unwrap();

        let stored = chat.send("hello").await.unwrap().unwrap();
        assert!(!stored.id.is_temporary());

        // the backend's own insert notification
        assert_eq!(chat.drain_changes(), 0);
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.entries()[0].delivery, Delivery::Sent);
    }

    #[tokio::test]
    async fn incoming_message_from_peer_is_applied() {
        let backend = Arc::new(MemoryBackend::new());
        let mut chat = session(&backend);
        chat.open().await.unwrap();

        backend
            .insert(
                Table::Messages,
                json!({"sender_id": "u2", "receiver_id": "u1", "content": "is it available?"}),
            )
            .await
            .unwrap();
        backend
            .insert(
                Table::Messages,
                json!({"sender_id": "u3", "receiver_id": "u1", "content": "elsewhere"}),
            )
            .await
            .unwrap();

        assert!(chat.next_change().await.unwrap());
        assert!(!chat.next_change().await.unwrap());
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_is_marked() {
        let backend = Arc::new(MemoryBackend::new());
        let mut chat = session(&backend);
        chat.open().await.unwrap();

        backend.set_fail_writes(true);
        assert!(chat.send("hello").await.is_err());
        assert_eq!(chat.entries().len(), 1);
        assert_eq!(chat.entries()[0].delivery, Delivery::Failed);
    }

    #[tokio::test]
    async fn close_stops_applying_changes() {
        let backend = Arc::new(MemoryBackend::new());
        let mut chat = session(&backend);
        chat.open().await.unwrap();
        chat.close();

        backend
            .insert(
                Table::Messages,
                json!({"sender_id": "u2", "receiver_id": "u1", "content": "late"}),
            )
            .await
            .unwrap();

        assert_eq!(chat.phase(), ChatPhase::Closed);
        assert!(matches!(
            chat.next_change().await,
            Err(ClientError::SubscriptionClosed)
        ));
        let late = ChangeEvent::insert(
            Table::Messages,
            json!({"id": 50, "sender_id": "u2", "receiver_id": "u1", "content": "late", "created_at": "2024-05-01T10:00:00Z"}),
        );
        assert!(!chat.apply_change(&late));
        assert!(chat.messages().is_empty());
        assert!(chat.send("after close").await.is_err());
    }
}
