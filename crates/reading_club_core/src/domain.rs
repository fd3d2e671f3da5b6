//! crates/reading_club_core/src/domain.rs
//!
//! Defines the pure, core data structures for the assistant pipeline.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who authored a message in a conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A single turn of a conversation. Never patched once stored; the whole
/// sequence is replaced instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The kinds of generated content that can be memoised per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Analysis,
    Topics,
    Draft,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Analysis => "analysis",
            ContentKind::Topics => "topics",
            ContentKind::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "analysis" => Some(ContentKind::Analysis),
            "topics" => Some(ContentKind::Topics),
            "draft" => Some(ContentKind::Draft),
            _ => None,
        }
    }
}

/// The kinds of persisted, multi-turn conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    Interview,
    Chat,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Interview => "interview",
            ConversationKind::Chat => "chat",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "interview" => Some(ConversationKind::Interview),
            "chat" => Some(ConversationKind::Chat),
            _ => None,
        }
    }

    /// Title used when the conversation has no known subject.
    pub fn fallback_title(&self) -> &'static str {
        match self {
            ConversationKind::Interview => "Interview",
            ConversationKind::Chat => "Chat",
        }
    }
}

/// What the caller knows about the subject (a book) content is generated about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectMetadata {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
}

/// A permanently memoised piece of generated text, unique per `(subject_id, kind)`.
#[derive(Debug, Clone)]
pub struct CachedContent {
    pub subject_id: Uuid,
    pub kind: ContentKind,
    pub text: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted conversation transcript.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ConversationKind,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The listing view of a conversation, without its transcript.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

// Reading clubs belong to the surrounding record keeper; only the fields the
// rate-limited endpoints touch are modelled.
#[derive(Debug, Clone)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
}

/// A club about to be created. The admin password is already hashed.
#[derive(Debug, Clone)]
pub struct NewClub {
    pub name: String,
    pub description: Option<String>,
    pub access_code: String,
    pub admin_password_hash: String,
}
