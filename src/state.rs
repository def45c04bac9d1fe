use crate::{
    config::Config,
    services::{
        AuthorizationEngine, ConversationService, InMemoryUserDirectory, SessionIssuer,
        UserDirectory,
    },
    store::InMemoryMembershipStore,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationService>,
    pub users: Arc<dyn UserDirectory>,
    /// Issues tokens at login and backs the `SessionAuth` middleware
    pub sessions: Arc<SessionIssuer>,
}

impl AppState {
    /// Wire the in-process store and user directory
    pub fn in_memory(config: &Config) -> Self {
        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
        let conversations = ConversationService::new(
            Arc::new(InMemoryMembershipStore::new()),
            users.clone(),
            AuthorizationEngine::new(config.removal_policy),
            config.limits,
        );
        let sessions = SessionIssuer::new(
            config.session_secret.as_bytes(),
            config.session_ttl_seconds,
            users.clone(),
        );

        Self {
            conversations: Arc::new(conversations),
            users,
            sessions: Arc::new(sessions),
        }
    }
}
