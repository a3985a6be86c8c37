use bazaar_shared::UserId;

use crate::chat::{list_conversations, ChatSession, Conversation};
use crate::error::Result;
use crate::state::AppState;

/// Open the conversation between the signed-in user and `peer`: subscribe
/// to message changes and load the history.
pub async fn open_conversation(state: &AppState, peer: UserId) -> Result<ChatSession> {
    let me = state.current_user_id().await?;
    let mut session = ChatSession::new(state.backend.clone(), me, peer);
    session.open().await?;
    Ok(session)
}

/// Everyone the signed-in user has exchanged messages with.
pub async fn conversations(state: &AppState) -> Result<Vec<Conversation>> {
    let me = state.current_user_id().await?;
    list_conversations(state.backend.as_ref(), &me).await
}
