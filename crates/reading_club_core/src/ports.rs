//! crates/reading_club_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the assistant pipeline.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific implementations like databases or LLM APIs.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    CachedContent, Club, ContentKind, Conversation, ConversationKind, ConversationSummary,
    Message, NewClub,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Text generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A pull-based sequence of text deltas produced by a streaming generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// Everything the generation backend needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: Option<u32>,
}

/// Result of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    AlreadyExists,
}

/// A conversation row about to be created.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub owner_id: Uuid,
    pub kind: ConversationKind,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub messages: Vec<Message>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Runs one generation to completion and returns the full text.
    async fn generate(&self, request: GenerationRequest) -> PortResult<String>;

    /// Starts a generation and returns its text deltas as they arrive.
    async fn generate_stream(&self, request: GenerationRequest) -> PortResult<TokenStream>;
}

#[async_trait]
pub trait ContentCacheRepository: Send + Sync {
    async fn find_cached_content(
        &self,
        subject_id: Uuid,
        kind: ContentKind,
    ) -> PortResult<Option<CachedContent>>;

    /// Inserts the row unless one already exists for `(subject_id, kind)`.
    /// An existing row is never overwritten.
    async fn insert_cached_content(&self, content: CachedContent) -> PortResult<PutOutcome>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create_conversation(&self, conversation: NewConversation)
        -> PortResult<Conversation>;

    /// Replaces the whole message list of a conversation owned by `owner_id`.
    async fn replace_conversation_messages(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        messages: &[Message],
    ) -> PortResult<()>;

    /// Most recently updated first.
    async fn list_conversations(
        &self,
        owner_id: Uuid,
        kind: Option<ConversationKind>,
        limit: u32,
    ) -> PortResult<Vec<ConversationSummary>>;
}

/// The surrounding record keeper: auth sessions, permanent records and clubs.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    // --- Records ---
    async fn create_record(
        &self,
        owner_id: Uuid,
        subject_id: Uuid,
        text: &str,
    ) -> PortResult<Uuid>;

    // --- Clubs ---
    async fn find_club_by_access_code(&self, access_code: &str) -> PortResult<Option<Club>>;

    /// Fails with `PortError::Conflict` when the access code is taken.
    async fn create_club(&self, club: NewClub) -> PortResult<Club>;
}
