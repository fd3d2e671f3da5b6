pub mod cache;
pub mod conversations;
pub mod domain;
pub mod interview;
pub mod ports;
pub mod prompts;
pub mod rate_limit;

pub use cache::ContentCache;
pub use conversations::{conversation_title, ConversationStore, SaveConversation};
pub use domain::{
    CachedContent, Club, ContentKind, Conversation, ConversationKind, ConversationSummary,
    Message, NewClub, Role, SubjectMetadata,
};
pub use ports::{
    ContentCacheRepository, ConversationRepository, DatabaseService, GenerationRequest,
    NewConversation, PortError, PortResult, PutOutcome, TextGenerationService, TokenStream,
};
pub use rate_limit::FixedWindowLimiter;
