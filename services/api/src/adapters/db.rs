//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! the storage ports from the `core` crate: the content cache, the conversation
//! store and the record keeper (sessions, records, clubs). All access goes
//! through `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_club_core::domain::{
    CachedContent, Club, ContentKind, Conversation, ConversationKind, ConversationSummary,
    Message, NewClub, Role,
};
use reading_club_core::ports::{
    ContentCacheRepository, ConversationRepository, DatabaseService, NewConversation, PortError,
    PortResult, PutOutcome,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn corrupt(column: &str, value: &str) -> PortError {
    PortError::Unexpected(format!("Unrecognised {} '{}' in database", column, value))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// The JSONB shape of one message inside `conversations.messages`.
#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: String,
    content: String,
}

impl StoredMessage {
    fn from_domain(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }

    fn to_domain(self) -> PortResult<Message> {
        let role = Role::parse(&self.role).ok_or_else(|| corrupt("role", &self.role))?;
        Ok(Message {
            role,
            content: self.content,
        })
    }
}

fn stored_messages(messages: &[Message]) -> Json<Vec<StoredMessage>> {
    Json(messages.iter().map(StoredMessage::from_domain).collect())
}

#[derive(FromRow)]
struct CachedContentRecord {
    subject_id: Uuid,
    kind: String,
    text: String,
    model_id: String,
    created_at: DateTime<Utc>,
}
impl CachedContentRecord {
    fn to_domain(self) -> PortResult<CachedContent> {
        let kind = ContentKind::parse(&self.kind).ok_or_else(|| corrupt("kind", &self.kind))?;
        Ok(CachedContent {
            subject_id: self.subject_id,
            kind,
            text: self.text,
            model_id: self.model_id,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    owner_id: Uuid,
    kind: String,
    subject_id: Option<Uuid>,
    title: String,
    messages: Json<Vec<StoredMessage>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self) -> PortResult<Conversation> {
        let kind =
            ConversationKind::parse(&self.kind).ok_or_else(|| corrupt("kind", &self.kind))?;
        let messages = self
            .messages
            .0
            .into_iter()
            .map(StoredMessage::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Conversation {
            id: self.id,
            owner_id: self.owner_id,
            kind,
            subject_id: self.subject_id,
            title: self.title,
            messages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ConversationSummaryRecord {
    id: Uuid,
    kind: String,
    subject_id: Option<Uuid>,
    title: String,
    message_count: i32,
    updated_at: DateTime<Utc>,
}
impl ConversationSummaryRecord {
    fn to_domain(self) -> PortResult<ConversationSummary> {
        let kind =
            ConversationKind::parse(&self.kind).ok_or_else(|| corrupt("kind", &self.kind))?;
        Ok(ConversationSummary {
            id: self.id,
            kind,
            subject_id: self.subject_id,
            title: self.title,
            message_count: self.message_count.max(0) as usize,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ClubRecord {
    id: Uuid,
    name: String,
}
impl ClubRecord {
    fn to_domain(self) -> Club {
        Club {
            id: self.id,
            name: self.name,
        }
    }
}

//=========================================================================================
// `ContentCacheRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentCacheRepository for DbAdapter {
    async fn find_cached_content(
        &self,
        subject_id: Uuid,
        kind: ContentKind,
    ) -> PortResult<Option<CachedContent>> {
        let record = sqlx::query_as::<_, CachedContentRecord>(
            "SELECT subject_id, kind, text, model_id, created_at \
             FROM cached_content WHERE subject_id = $1 AND kind = $2",
        )
        .bind(subject_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(CachedContentRecord::to_domain).transpose()
    }

    /// The unique `(subject_id, kind)` constraint settles concurrent writers:
    /// the first insert wins and later ones affect no rows.
    async fn insert_cached_content(&self, content: CachedContent) -> PortResult<PutOutcome> {
        let result = sqlx::query(
            "INSERT INTO cached_content (subject_id, kind, text, model_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (subject_id, kind) DO NOTHING",
        )
        .bind(content.subject_id)
        .bind(content.kind.as_str())
        .bind(&content.text)
        .bind(&content.model_id)
        .bind(content.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(if result.rows_affected() == 1 {
            PutOutcome::Stored
        } else {
            PutOutcome::AlreadyExists
        })
    }
}

//=========================================================================================
// `ConversationRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationRepository for DbAdapter {
    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (id, owner_id, kind, subject_id, title, messages) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, owner_id, kind, subject_id, title, messages, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(conversation.owner_id)
        .bind(conversation.kind.as_str())
        .bind(conversation.subject_id)
        .bind(&conversation.title)
        .bind(stored_messages(&conversation.messages))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn replace_conversation_messages(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        messages: &[Message],
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE conversations SET messages = $1, updated_at = NOW() \
             WHERE id = $2 AND owner_id = $3",
        )
        .bind(stored_messages(messages))
        .bind(conversation_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn list_conversations(
        &self,
        owner_id: Uuid,
        kind: Option<ConversationKind>,
        limit: u32,
    ) -> PortResult<Vec<ConversationSummary>> {
        let records = sqlx::query_as::<_, ConversationSummaryRecord>(
            "SELECT id, kind, subject_id, title, \
                    jsonb_array_length(messages) AS message_count, updated_at \
             FROM conversations \
             WHERE owner_id = $1 AND ($2::TEXT IS NULL OR kind = $2) \
             ORDER BY updated_at DESC \
             LIMIT $3",
        )
        .bind(owner_id)
        .bind(kind.map(|k| k.as_str()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records
            .into_iter()
            .map(ConversationSummaryRecord::to_domain)
            .collect()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn create_record(
        &self,
        owner_id: Uuid,
        subject_id: Uuid,
        text: &str,
    ) -> PortResult<Uuid> {
        sqlx::query_scalar(
            "INSERT INTO records (id, owner_id, subject_id, text) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(subject_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn find_club_by_access_code(&self, access_code: &str) -> PortResult<Option<Club>> {
        let record = sqlx::query_as::<_, ClubRecord>(
            "SELECT id, name FROM clubs WHERE access_code = $1",
        )
        .bind(access_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(ClubRecord::to_domain))
    }

    async fn create_club(&self, club: NewClub) -> PortResult<Club> {
        let record = sqlx::query_as::<_, ClubRecord>(
            "INSERT INTO clubs (id, name, description, access_code, admin_password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(&club.name)
        .bind(&club.description)
        .bind(&club.access_code)
        .bind(&club.admin_password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Access code {} is taken", club.access_code))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }
}
