//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use reading_club_core::{
    ports::{
        ContentCacheRepository, ConversationRepository, DatabaseService, TextGenerationService,
    },
    ContentCache, ConversationStore, FixedWindowLimiter,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub generator: Arc<dyn TextGenerationService>,
    pub cache: ContentCache,
    pub conversations: ConversationStore,
    pub verify_limiter: Arc<FixedWindowLimiter>,
    pub club_create_limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    /// Wires the services together. The limiters are sized from `config`.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        cache_repo: Arc<dyn ContentCacheRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        generator: Arc<dyn TextGenerationService>,
    ) -> Self {
        let verify = config.verify_rate_limit;
        let club_create = config.club_create_rate_limit;
        Self {
            db,
            generator,
            cache: ContentCache::new(cache_repo),
            conversations: ConversationStore::new(conversation_repo),
            verify_limiter: Arc::new(FixedWindowLimiter::new(verify.ceiling, verify.window)),
            club_create_limiter: Arc::new(FixedWindowLimiter::new(
                club_create.ceiling,
                club_create.window,
            )),
            config,
        }
    }

    /// Both limiters, for the periodic pruning task.
    pub fn limiters(&self) -> [Arc<FixedWindowLimiter>; 2] {
        [self.verify_limiter.clone(), self.club_create_limiter.clone()]
    }
}
