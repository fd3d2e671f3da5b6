//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of every storage port. Used when no
//! `DATABASE_URL` is configured and by the test suite. Each map sits behind a
//! single mutex; read-modify-write sequences hold the lock for their whole span.

use async_trait::async_trait;
use chrono::Utc;
use reading_club_core::{
    domain::{
        CachedContent, Club, ContentKind, Conversation, ConversationKind, ConversationSummary,
        Message, NewClub,
    },
    ports::{
        ContentCacheRepository, ConversationRepository, DatabaseService, NewConversation,
        PortError, PortResult, PutOutcome,
    },
};
use std::collections::{hash_map::Entry, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A record written through the records collaborator.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub subject_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
struct StoredClub {
    club: Club,
    access_code: String,
}

#[derive(Default)]
pub struct MemoryAdapter {
    cached_content: Mutex<HashMap<(Uuid, ContentKind), CachedContent>>,
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    auth_sessions: Mutex<HashMap<String, Uuid>>,
    records: Mutex<Vec<StoredRecord>>,
    clubs: Mutex<Vec<StoredClub>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a login session so the identity pre-check resolves it.
    pub fn insert_auth_session(&self, session_id: &str, user_id: Uuid) {
        lock(&self.auth_sessions).insert(session_id.to_string(), user_id);
    }

    pub fn cached_content_count(&self) -> usize {
        lock(&self.cached_content).len()
    }

    pub fn conversation_count(&self) -> usize {
        lock(&self.conversations).len()
    }

    /// The stored conversation, if `owner_id` owns it.
    pub fn conversation(&self, conversation_id: Uuid, owner_id: Uuid) -> Option<Conversation> {
        lock(&self.conversations)
            .get(&conversation_id)
            .filter(|c| c.owner_id == owner_id)
            .cloned()
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        lock(&self.records).clone()
    }
}

//=========================================================================================
// `ContentCacheRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentCacheRepository for MemoryAdapter {
    async fn find_cached_content(
        &self,
        subject_id: Uuid,
        kind: ContentKind,
    ) -> PortResult<Option<CachedContent>> {
        Ok(lock(&self.cached_content).get(&(subject_id, kind)).cloned())
    }

    async fn insert_cached_content(&self, content: CachedContent) -> PortResult<PutOutcome> {
        let mut cache = lock(&self.cached_content);
        match cache.entry((content.subject_id, content.kind)) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(content);
                Ok(PutOutcome::Stored)
            }
        }
    }
}

//=========================================================================================
// `ConversationRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationRepository for MemoryAdapter {
    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> PortResult<Conversation> {
        let now = Utc::now();
        let created = Conversation {
            id: Uuid::new_v4(),
            owner_id: conversation.owner_id,
            kind: conversation.kind,
            subject_id: conversation.subject_id,
            title: conversation.title,
            messages: conversation.messages,
            created_at: now,
            updated_at: now,
        };
        lock(&self.conversations).insert(created.id, created.clone());
        Ok(created)
    }

    async fn replace_conversation_messages(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        messages: &[Message],
    ) -> PortResult<()> {
        let mut conversations = lock(&self.conversations);
        match conversations.get_mut(&conversation_id) {
            Some(conversation) if conversation.owner_id == owner_id => {
                conversation.messages = messages.to_vec();
                conversation.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            ))),
        }
    }

    async fn list_conversations(
        &self,
        owner_id: Uuid,
        kind: Option<ConversationKind>,
        limit: u32,
    ) -> PortResult<Vec<ConversationSummary>> {
        let conversations = lock(&self.conversations);
        let mut owned: Vec<&Conversation> = conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(owned
            .into_iter()
            .take(limit as usize)
            .map(|c| ConversationSummary {
                id: c.id,
                kind: c.kind,
                subject_id: c.subject_id,
                title: c.title.clone(),
                message_count: c.messages.len(),
                updated_at: c.updated_at,
            })
            .collect())
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        lock(&self.auth_sessions)
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)
    }

    async fn create_record(
        &self,
        owner_id: Uuid,
        subject_id: Uuid,
        text: &str,
    ) -> PortResult<Uuid> {
        let record = StoredRecord {
            id: Uuid::new_v4(),
            owner_id,
            subject_id,
            text: text.to_string(),
        };
        let id = record.id;
        lock(&self.records).push(record);
        Ok(id)
    }

    async fn find_club_by_access_code(&self, access_code: &str) -> PortResult<Option<Club>> {
        Ok(lock(&self.clubs)
            .iter()
            .find(|c| c.access_code == access_code)
            .map(|c| c.club.clone()))
    }

    async fn create_club(&self, club: NewClub) -> PortResult<Club> {
        let mut clubs = lock(&self.clubs);
        if clubs.iter().any(|c| c.access_code == club.access_code) {
            return Err(PortError::Conflict(format!(
                "Access code {} is taken",
                club.access_code
            )));
        }
        let created = Club {
            id: Uuid::new_v4(),
            name: club.name,
        };
        clubs.push(StoredClub {
            club: created.clone(),
            access_code: club.access_code,
        });
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reading_club_core::{ConversationStore, SaveConversation};
    use std::sync::Arc;

    fn save_request(
        conversation_id: Option<Uuid>,
        owner_id: Option<Uuid>,
        messages: Vec<Message>,
    ) -> SaveConversation {
        SaveConversation {
            conversation_id,
            owner_id,
            kind: ConversationKind::Interview,
            subject_id: None,
            title: "Interview".to_string(),
            messages,
        }
    }

    #[tokio::test]
    async fn concurrent_puts_persist_exactly_one_row() {
        let adapter = Arc::new(MemoryAdapter::new());
        let subject = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..16 {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                adapter
                    .insert_cached_content(CachedContent {
                        subject_id: subject,
                        kind: ContentKind::Analysis,
                        text: format!("writer {i}"),
                        model_id: "m".to_string(),
                        created_at: Utc::now(),
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap() == PutOutcome::Stored {
                stored += 1;
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(adapter.cached_content_count(), 1);
    }

    #[tokio::test]
    async fn save_then_resave_replaces_messages() {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = ConversationStore::new(adapter.clone());
        let owner = Uuid::new_v4();

        let first = vec![Message::user("I loved the ending")];
        let id = store
            .save(save_request(None, Some(owner), first))
            .await
            .unwrap()
            .expect("owner present");

        let extended = vec![
            Message::user("I loved the ending"),
            Message::assistant("What about it moved you?"),
            Message::user("The letter"),
        ];
        let same = store
            .save(save_request(Some(id), Some(owner), extended.clone()))
            .await
            .unwrap();

        assert_eq!(same, Some(id));
        assert_eq!(adapter.conversation_count(), 1);
        let stored = adapter.conversation(id, owner).unwrap();
        assert_eq!(stored.messages, extended);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn anonymous_save_writes_nothing() {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = ConversationStore::new(adapter.clone());

        let result = store
            .save(save_request(None, None, vec![Message::user("hi")]))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(adapter.conversation_count(), 0);
    }

    #[tokio::test]
    async fn other_owners_cannot_replace_a_conversation() {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = ConversationStore::new(adapter.clone());
        let owner = Uuid::new_v4();
        let id = store
            .save(save_request(None, Some(owner), vec![Message::user("mine")]))
            .await
            .unwrap()
            .unwrap();

        let result = store
            .save(save_request(Some(id), Some(Uuid::new_v4()), vec![]))
            .await;

        assert!(matches!(result, Err(PortError::NotFound(_))));
        let stored = adapter.conversation(id, owner).unwrap();
        assert_eq!(stored.messages, vec![Message::user("mine")]);
    }

    #[tokio::test]
    async fn listing_filters_by_kind_and_limits() {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = ConversationStore::new(adapter.clone());
        let owner = Uuid::new_v4();

        for kind in [
            ConversationKind::Interview,
            ConversationKind::Chat,
            ConversationKind::Interview,
        ] {
            store
                .save(SaveConversation {
                    kind,
                    ..save_request(None, Some(owner), vec![Message::user("x")])
                })
                .await
                .unwrap();
        }
        store
            .save(save_request(None, Some(Uuid::new_v4()), vec![]))
            .await
            .unwrap();

        assert_eq!(store.list(owner, None, 20).await.unwrap().len(), 3);
        assert_eq!(store.list(owner, None, 2).await.unwrap().len(), 2);
        let interviews = store
            .list(owner, Some(ConversationKind::Interview), 20)
            .await
            .unwrap();
        assert_eq!(interviews.len(), 2);
        assert!(interviews.iter().all(|c| c.kind == ConversationKind::Interview));
    }

    #[tokio::test]
    async fn duplicate_access_code_conflicts() {
        let adapter = MemoryAdapter::new();
        let new_club = NewClub {
            name: "Tuesday Readers".to_string(),
            description: None,
            access_code: "tue".to_string(),
            admin_password_hash: "hash".to_string(),
        };

        let club = adapter.create_club(new_club.clone()).await.unwrap();
        let found = adapter.find_club_by_access_code("tue").await.unwrap().unwrap();
        assert_eq!(found.id, club.id);

        let result = adapter.create_club(new_club).await;
        assert!(matches!(result, Err(PortError::Conflict(_))));
    }
}
