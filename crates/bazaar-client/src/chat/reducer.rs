//! Conversation state as a pure function of the events that reached it.
//!
//! Fetch results, optimistic sends, insert acknowledgements and realtime
//! changes all go through [`reduce`]. Rows are deduplicated by server id;
//! a remote insert with no known id may instead reconcile a pending local
//! send with the same sender, receiver and content created within
//! [`PENDING_MATCH_WINDOW_SECS`] of it.

use chrono::Duration;

use bazaar_shared::constants::PENDING_MATCH_WINDOW_SECS;
use bazaar_shared::{Message, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Loading,
    Synced,
    Closed,
}

/// Delivery status of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Shown optimistically, insert in flight.
    Pending,
    /// Backed by a server row.
    Sent,
    /// The insert failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub message: Message,
    pub delivery: Delivery,
}

impl ChatEntry {
    fn sent(message: Message) -> Self {
        Self {
            message,
            delivery: Delivery::Sent,
        }
    }

    fn is_local(&self) -> bool {
        self.delivery != Delivery::Sent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    pub me: UserId,
    pub peer: UserId,
    pub phase: ChatPhase,
    /// Ordered by `created_at`, ties in arrival order.
    pub entries: Vec<ChatEntry>,
    loaded_once: bool,
}

impl ChatState {
    pub fn new(me: UserId, peer: UserId) -> Self {
        Self {
            me,
            peer,
            phase: ChatPhase::Idle,
            entries: Vec::new(),
            loaded_once: false,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    fn in_conversation(&self, message: &Message) -> bool {
        message.is_between(&self.me, &self.peer)
    }

    fn position_of(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|e| &e.message.id == id)
    }

    /// A pending local send that `remote` is the server copy of.
    fn pending_match(&self, remote: &Message) -> Option<usize> {
        let window = Duration::seconds(PENDING_MATCH_WINDOW_SECS);
        self.entries.iter().position(|e| {
            let local = &e.message;
            e.delivery == Delivery::Pending
                && local.sender_id == remote.sender_id
                && local.receiver_id == remote.receiver_id
                && local.content == remote.content
                && (local.created_at - remote.created_at).abs() <= window
        })
    }

    /// Insert or replace `message` as a server-backed entry.
    fn upsert(&mut self, message: Message) {
        if let Some(i) = self.position_of(&message.id) {
            self.entries[i] = ChatEntry::sent(message);
        } else if let Some(i) = self.pending_match(&message) {
            self.entries[i] = ChatEntry::sent(message);
        } else {
            self.entries.push(ChatEntry::sent(message));
        }
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.message.created_at);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    FetchStarted,
    /// Full conversation history from the backend.
    Loaded(Vec<Message>),
    FetchFailed,
    /// An optimistic send carrying a temporary id.
    LocalSent(Message),
    /// The insert for `temp_id` returned the stored row.
    Acknowledged {
        temp_id: MessageId,
        message: Message,
    },
    SendFailed(MessageId),
    RemoteInserted(Message),
    RemoteUpdated(Message),
    RemoteDeleted(MessageId),
    Closed,
}

pub fn reduce(mut state: ChatState, event: ChatEvent) -> ChatState {
    if state.phase == ChatPhase::Closed {
        return state;
    }

    match event {
        ChatEvent::FetchStarted => {
            state.phase = ChatPhase::Loading;
        }
        ChatEvent::Loaded(messages) => {
            let local: Vec<ChatEntry> = state.entries.drain(..).filter(ChatEntry::is_local).collect();
            let mut next = ChatState {
                entries: local,
                ..state
            };
            for message in messages {
                if next.in_conversation(&message) {
                    next.upsert(message);
                }
            }
            next.sort();
            next.phase = ChatPhase::Synced;
            next.loaded_once = true;
            return next;
        }
        ChatEvent::FetchFailed => {
            state.phase = if state.loaded_once {
                ChatPhase::Synced
            } else {
                ChatPhase::Idle
            };
        }
        ChatEvent::LocalSent(message) => {
            if state.in_conversation(&message) {
                state.entries.push(ChatEntry {
                    message,
                    delivery: Delivery::Pending,
                });
                state.sort();
            }
        }
        ChatEvent::Acknowledged { temp_id, message } => {
            let temp = state.position_of(&temp_id);
            match (temp, state.position_of(&message.id)) {
                // realtime delivered the row first
                (Some(t), Some(_)) => {
                    state.entries.remove(t);
                }
                (Some(t), None) => {
                    state.entries[t] = ChatEntry::sent(message);
                }
                (None, _) => state.upsert(message),
            }
            state.sort();
        }
        ChatEvent::SendFailed(temp_id) => {
            if let Some(i) = state.position_of(&temp_id) {
                state.entries[i].delivery = Delivery::Failed;
            }
        }
        ChatEvent::RemoteInserted(message) | ChatEvent::RemoteUpdated(message) => {
            if state.in_conversation(&message) {
                state.upsert(message);
                state.sort();
            }
        }
        ChatEvent::RemoteDeleted(id) => {
            state.entries.retain(|e| e.message.id != id);
        }
        ChatEvent::Closed => {
            state.phase = ChatPhase::Closed;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: &str, from: &str, to: &str, content: &str, secs: i64) -> Message {
        Message {
            id: MessageId::from(id),
            sender_id: UserId::from(from),
            receiver_id: UserId::from(to),
            content: content.into(),
            created_at: at(secs),
        }
    }

    fn state() -> ChatState {
        ChatState::new(UserId::from("u1"), UserId::from("u2"))
    }

    fn ids(s: &ChatState) -> Vec<&str> {
        s.messages().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn load_keeps_only_the_conversation_in_order() {
        let s = reduce(state(), ChatEvent::FetchStarted);
        assert_eq!(s.phase, ChatPhase::Loading);

        let s = reduce(
            s,
            ChatEvent::Loaded(vec![
                msg("2", "u2", "u1", "hey", 20),
                msg("1", "u1", "u2", "hi", 10),
                msg("3", "u1", "u3", "other", 15),
            ]),
        );
        assert_eq!(s.phase, ChatPhase::Synced);
        assert_eq!(ids(&s), vec!["1", "2"]);
    }

    #[test]
    fn failed_first_fetch_returns_to_idle() {
        let s = reduce(state(), ChatEvent::FetchStarted);
        let s = reduce(s, ChatEvent::FetchFailed);
        assert_eq!(s.phase, ChatPhase::Idle);
        assert!(s.entries.is_empty());
    }

    #[test]
    fn ack_replaces_pending_entry() {
        let mut local = msg("local-1", "u1", "u2", "hello", 100);
        local.id = MessageId::from("local-1");
        let s = reduce(state(), ChatEvent::LocalSent(local));
        assert_eq!(s.entries[0].delivery, Delivery::Pending);

        let s = reduce(
            s,
            ChatEvent::Acknowledged {
                temp_id: MessageId::from("local-1"),
                message: msg("9", "u1", "u2", "hello", 101),
            },
        );
        assert_eq!(ids(&s), vec!["9"]);
        assert_eq!(s.entries[0].delivery, Delivery::Sent);
    }

    #[test]
    fn realtime_before_ack_yields_one_message() {
        let s = reduce(
            state(),
            ChatEvent::LocalSent(msg("local-1", "u1", "u2", "hello", 100)),
        );
        let s = reduce(
            s,
            ChatEvent::RemoteInserted(msg("9", "u1", "u2", "hello", 102)),
        );
        assert_eq!(ids(&s), vec!["9"]);

        let s = reduce(
            s,
            ChatEvent::Acknowledged {
                temp_id: MessageId::from("local-1"),
                message: msg("9", "u1", "u2", "hello", 102),
            },
        );
        assert_eq!(ids(&s), vec!["9"]);
    }

    #[test]
    fn ack_before_realtime_yields_one_message() {
        let s = reduce(
            state(),
            ChatEvent::LocalSent(msg("local-1", "u1", "u2", "hello", 100)),
        );
        let s = reduce(
            s,
            ChatEvent::Acknowledged {
                temp_id: MessageId::from("local-1"),
                message: msg("9", "u1", "u2", "hello", 100),
            },
        );
        let s = reduce(s, ChatEvent::RemoteInserted(msg("9", "u1", "u2", "hello", 100)));
        assert_eq!(ids(&s), vec!["9"]);
    }

    #[test]
    fn pending_match_respects_the_window() {
        let s = reduce(
            state(),
            ChatEvent::LocalSent(msg("local-1", "u1", "u2", "hello", 0)),
        );
        let s = reduce(
            s,
            ChatEvent::RemoteInserted(msg("9", "u1", "u2", "hello", 45)),
        );
        assert_eq!(ids(&s), vec!["local-1", "9"]);
    }

    #[test]
    fn other_conversations_are_ignored() {
        let s = reduce(state(), ChatEvent::Loaded(vec![]));
        let s = reduce(s, ChatEvent::RemoteInserted(msg("5", "u3", "u1", "psst", 1)));
        assert!(s.entries.is_empty());
    }

    #[test]
    fn update_and_delete() {
        let s = reduce(
            state(),
            ChatEvent::Loaded(vec![msg("1", "u1", "u2", "hi", 1), msg("2", "u2", "u1", "yo", 2)]),
        );
        let s = reduce(s, ChatEvent::RemoteUpdated(msg("1", "u1", "u2", "hi!", 1)));
        assert_eq!(s.entries[0].message.content, "hi!");

        let s = reduce(s, ChatEvent::RemoteDeleted(MessageId::from("2")));
        assert_eq!(ids(&s), vec!["1"]);
    }

    #[test]
    fn send_failure_marks_entry_and_survives_reload() {
        let s = reduce(
            state(),
            ChatEvent::LocalSent(msg("local-1", "u1", "u2", "hello", 5)),
        );
        let s = reduce(s, ChatEvent::SendFailed(MessageId::from("local-1")));
        assert_eq!(s.entries[0].delivery, Delivery::Failed);

        let s = reduce(s, ChatEvent::Loaded(vec![msg("1", "u2", "u1", "hey", 1)]));
        assert_eq!(ids(&s), vec!["1", "local-1"]);
    }

    #[test]
    fn closed_state_ignores_everything() {
        let s = reduce(state(), ChatEvent::Closed);
        let s = reduce(s, ChatEvent::RemoteInserted(msg("1", "u1", "u2", "hi", 1)));
        let s = reduce(s, ChatEvent::FetchStarted);
        assert_eq!(s.phase, ChatPhase::Closed);
        assert!(s.entries.is_empty());
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let s = reduce(
            state(),
            ChatEvent::Loaded(vec![msg("a", "u1", "u2", "1", 5), msg("b", "u2", "u1", "2", 5)]),
        );
        let s = reduce(s, ChatEvent::RemoteInserted(msg("c", "u1", "u2", "3", 5)));
        assert_eq!(ids(&s), vec!["a", "b", "c"]);
    }
}
