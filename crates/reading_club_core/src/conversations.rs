//! crates/reading_club_core/src/conversations.rs
//!
//! Create-or-replace persistence of conversation transcripts.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ConversationKind, ConversationSummary, Message, SubjectMetadata};
use crate::ports::{ConversationRepository, NewConversation, PortResult};

/// One save request. The caller always submits the complete history.
#[derive(Debug, Clone)]
pub struct SaveConversation {
    pub conversation_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub kind: ConversationKind,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct ConversationStore {
    repo: Arc<dyn ConversationRepository>,
}

impl ConversationStore {
    pub fn new(repo: Arc<dyn ConversationRepository>) -> Self {
        Self { repo }
    }

    /// Persists the transcript and returns its identity.
    ///
    /// Anonymous callers are never persisted: the result is `Ok(None)` and no
    /// row is written. Without a conversation id a new row is created; with
    /// one, that row's messages are replaced wholesale (last writer wins).
    pub async fn save(&self, request: SaveConversation) -> PortResult<Option<Uuid>> {
        let Some(owner_id) = request.owner_id else {
            return Ok(None);
        };

        match request.conversation_id {
            Some(conversation_id) => {
                self.repo
                    .replace_conversation_messages(conversation_id, owner_id, &request.messages)
                    .await?;
                Ok(Some(conversation_id))
            }
            None => {
                let created = self
                    .repo
                    .create_conversation(NewConversation {
                        owner_id,
                        kind: request.kind,
                        subject_id: request.subject_id,
                        title: request.title,
                        messages: request.messages,
                    })
                    .await?;
                Ok(Some(created.id))
            }
        }
    }

    pub async fn list(
        &self,
        owner_id: Uuid,
        kind: Option<ConversationKind>,
        limit: u32,
    ) -> PortResult<Vec<ConversationSummary>> {
        self.repo.list_conversations(owner_id, kind, limit).await
    }
}

/// The subject's title when known, else the per-kind fallback.
pub fn conversation_title(kind: ConversationKind, subject: Option<&SubjectMetadata>) -> String {
    subject
        .map(|s| s.title.trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| kind.fallback_title().to_string())
}
