pub mod conversation;
pub mod user;

pub use conversation::{Conversation, ConversationKind, ConversationView, LifecycleState};
pub use user::User;
