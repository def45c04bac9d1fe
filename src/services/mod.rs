pub mod authorization;
pub mod conversation_service;
pub mod keyed_locks;
pub mod session;
pub mod user_directory;
pub mod validation;

pub use authorization::{Action, AuthorizationEngine, Denial, RemovalPolicy};
pub use conversation_service::{ConversationLimits, ConversationService};
pub use session::SessionIssuer;
pub use user_directory::{InMemoryUserDirectory, UserDirectory};
