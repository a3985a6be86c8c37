//! Two-party chat over the `messages` table.

pub mod conversations;
pub mod reducer;
pub mod session;

pub use conversations::{list_conversations, Conversation};
pub use reducer::{reduce, ChatEntry, ChatEvent, ChatPhase, ChatState, Delivery};
pub use session::ChatSession;
