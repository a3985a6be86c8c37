use std::collections::HashMap;

use tracing::debug;

use bazaar_shared::query::{Filter, Query};
use bazaar_shared::{Table, UserId, UserProfile};
use serde::Deserialize;

use crate::error::Result;
use crate::remote::{tables, Backend};

/// Someone the user has exchanged messages with.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub peer: UserId,
    /// `None` when the peer has no `profiles` row.
    pub profile: Option<UserProfile>,
}

impl Conversation {
    pub fn title(&self) -> String {
        match &self.profile {
            Some(p) => p.display_name(),
            None => self.peer.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Receiver {
    receiver_id: UserId,
}

#[derive(Deserialize)]
struct Sender {
    sender_id: UserId,
}

/// Distinct counterparts of `me`: recipients of sent messages first, then
/// senders of received ones, each in first-seen order, `me` excluded.
pub async fn list_conversations(backend: &dyn Backend, me: &UserId) -> Result<Vec<Conversation>> {
    let sent = Query::table(Table::Messages)
        .select("receiver_id")
        .eq("sender_id", me.as_str());
    let received = Query::table(Table::Messages)
        .select("sender_id")
        .eq("receiver_id", me.as_str());

    let sent: Vec<Receiver> = tables::select_as(backend, &sent).await?;
    let received: Vec<Sender> = tables::select_as(backend, &received).await?;

    let mut peers: Vec<UserId> = Vec::new();
    let candidates = sent
        .into_iter()
        .map(|m| m.receiver_id)
        .chain(received.into_iter().map(|m| m.sender_id));
    for id in candidates {
        if id.as_str().is_empty() || &id == me || peers.contains(&id) {
            continue;
        }
        peers.push(id);
    }

    if peers.is_empty() {
        return Ok(Vec::new());
    }

    let profiles_query =
        Query::table(Table::Profiles).filter(Filter::is_in("id", peers.iter().map(UserId::as_str)));
    let profiles: Vec<UserProfile> = tables::select_as(backend, &profiles_query).await?;
    let mut by_id: HashMap<UserId, UserProfile> =
        profiles.into_iter().map(|p| (p.id.clone(), p)).collect();

    debug!(count = peers.len(), "conversations listed");
    Ok(peers
        .into_iter()
        .map(|peer| Conversation {
            profile: by_id.remove(&peer),
            peer,
        })
        .collect())
}
