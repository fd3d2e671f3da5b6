//! services/api/src/web/agent.rs
//!
//! Axum handlers for the `/agent/*` endpoints: cached analysis, the streamed
//! interview and chat conversations, streamed topics and drafts, interview
//! summaries and the conversation listing.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::FutureExt;
use reading_club_core::{
    conversation_title,
    domain::{ContentKind, ConversationKind, Message},
    interview::{next_actions, summarize, SummarizeInput},
    ports::GenerationRequest,
    prompts::{content_request, system_prompt, PromptTemplate},
    SaveConversation,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::HandlerError;
use crate::web::{
    middleware::Caller,
    protocol::{
        into_messages, AnalysisRequest, AnalysisResponse, ContentRequest,
        ConversationListResponse, ConversationRequest, ConversationSummaryPayload,
        ConversationsQuery, ErrorResponse, SubjectMetadataPayload, SummarizeRequest,
        SummarizeResponse,
    },
    relay::{relay, CompletionHook},
    state::AppState,
};

pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";
pub const SUMMARY_AVAILABLE_HEADER: &str = "x-summary-available";

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

const INVALID_BODY: &str = "The request body is not valid JSON for this endpoint.";
const SUBJECT_REQUIRED: &str = "Book information with a title is required.";
const MESSAGES_REQUIRED: &str = "Messages are required.";
const UNKNOWN_CONVERSATION_TYPE: &str = "Unknown conversation type.";

/// Unwraps a JSON body, reporting any malformed body as a validation failure.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HandlerError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        HandlerError::Validation(INVALID_BODY)
    })
}

/// Parses the `limit` query value leniently.
///
/// The leading integer is used (`"12abc"` is 12); missing, unparsable and zero
/// values fall back to the default, and the result is clamped to `1..=100`.
pub fn parse_limit(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim) else {
        return DEFAULT_LIST_LIMIT;
    };
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let leading: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if leading.is_empty() {
        return DEFAULT_LIST_LIMIT;
    }
    // Overflowing values saturate; only the sign matters for clamping.
    let magnitude = leading.parse::<u64>().unwrap_or(u64::MAX);

    match (negative, magnitude) {
        (_, 0) => DEFAULT_LIST_LIMIT,
        (true, _) => 1,
        (false, n) => n.min(u64::from(MAX_LIST_LIMIT)) as u32,
    }
}

//=========================================================================================
// Analysis (cached, blocking)
//=========================================================================================

/// Generate or fetch the cached analysis of a book.
#[utoipa::path(
    post,
    path = "/agent/analysis",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "The analysis text", body = AnalysisResponse),
        (status = 400, description = "Missing book title", body = ErrorResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn analysis_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, HandlerError> {
    let request = parse_body(payload)?;
    let subject = request
        .subject_metadata
        .and_then(SubjectMetadataPayload::into_domain)
        .ok_or(HandlerError::Validation(SUBJECT_REQUIRED))?;
    if caller.0.is_none() {
        return Err(HandlerError::Unauthorized);
    }

    let model = state.config.analysis_model.clone();
    let generation = GenerationRequest {
        system_prompt: system_prompt(PromptTemplate::Analysis, Some(&subject)),
        messages: vec![Message::user(content_request(PromptTemplate::Analysis, &subject))],
        model: model.clone(),
        max_tokens: Some(state.config.analysis_max_tokens),
    };
    let generator = state.generator.clone();

    let analysis = state
        .cache
        .get_or_generate(request.subject_id, ContentKind::Analysis, &model, move || async move {
            generator.generate(generation).await
        })
        .await
        .map_err(HandlerError::generation)?;

    Ok(Json(AnalysisResponse { analysis }))
}

//=========================================================================================
// Interview & Chat (streamed, persisted)
//=========================================================================================

/// Continue an interview about a book, streamed as Server-Sent Events.
#[utoipa::path(
    post,
    path = "/agent/interview",
    request_body = ConversationRequest,
    responses(
        (status = 200, description = "Event stream of `{\"text\"}` frames", body = String, content_type = "text/event-stream",
            headers(
                ("x-conversation-id" = String, description = "Set when the transcript was saved"),
                ("x-summary-available" = bool, description = "Whether a summary can be offered")
            )
        ),
        (status = 400, description = "Missing or invalid messages", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Response, HandlerError> {
    let request = parse_body(payload)?;
    converse(
        state,
        caller,
        request,
        ConversationKind::Interview,
        PromptTemplate::Interview,
    )
    .await
}

/// Free conversation with the assistant, streamed as Server-Sent Events.
#[utoipa::path(
    post,
    path = "/agent/chat",
    request_body = ConversationRequest,
    responses(
        (status = 200, description = "Event stream of `{\"text\"}` frames", body = String, content_type = "text/event-stream",
            headers(("x-conversation-id" = String, description = "Set when the transcript was saved"))
        ),
        (status = 400, description = "Missing or invalid messages", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Response, HandlerError> {
    let request = parse_body(payload)?;
    converse(state, caller, request, ConversationKind::Chat, PromptTemplate::Chat).await
}

/// Saves the incoming transcript, opens the generation stream and relays it.
///
/// Anonymous callers get the stream without any persistence. For identified
/// callers the transcript is saved before streaming (so the id can go out as a
/// header) and saved again under the same id with the assistant reply once the
/// stream completes.
async fn converse(
    state: Arc<AppState>,
    caller: Caller,
    request: ConversationRequest,
    kind: ConversationKind,
    template: PromptTemplate,
) -> Result<Response, HandlerError> {
    let messages = into_messages(
        request
            .messages
            .ok_or(HandlerError::Validation(MESSAGES_REQUIRED))?,
    );
    let subject = request
        .subject_metadata
        .and_then(SubjectMetadataPayload::into_domain);

    let tokens = state
        .generator
        .generate_stream(GenerationRequest {
            system_prompt: system_prompt(template, subject.as_ref()),
            messages: messages.clone(),
            model: state.config.conversation_model.clone(),
            max_tokens: None,
        })
        .await
        .map_err(HandlerError::generation)?;

    // Only a stream that actually opened gets a row.
    let mut save = SaveConversation {
        conversation_id: request.conversation_id,
        owner_id: caller.0,
        kind,
        subject_id: request.subject_id,
        title: conversation_title(kind, subject.as_ref()),
        messages: messages.clone(),
    };
    let conversation_id = match state.conversations.save(save.clone()).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to save {} transcript: {}", kind.as_str(), e);
            None
        }
    };

    let on_complete = conversation_id.map(|id| {
        save.conversation_id = Some(id);
        let store = state.conversations.clone();
        let hook: CompletionHook = Box::new(move |reply: String| {
            async move {
                let mut save = save;
                save.messages.push(Message::assistant(reply));
                match store.save(save).await {
                    Ok(_) => info!("Saved completed {} {}.", kind.as_str(), id),
                    Err(e) => error!("Failed to save completed {} {}: {}", kind.as_str(), id, e),
                }
            }
            .boxed()
        });
        hook
    });

    let mut headers = HeaderMap::new();
    if kind == ConversationKind::Interview {
        let available = next_actions(&messages).can_summarize;
        headers.insert(
            SUMMARY_AVAILABLE_HEADER,
            HeaderValue::from_static(if available { "true" } else { "false" }),
        );
    }
    if let Some(value) = conversation_id.and_then(|id| HeaderValue::from_str(&id.to_string()).ok())
    {
        headers.insert(CONVERSATION_ID_HEADER, value);
    }

    Ok((headers, relay(tokens, on_complete)).into_response())
}

//=========================================================================================
// Topics & Draft (streamed, not persisted)
//=========================================================================================

/// Stream discussion topics for a book.
#[utoipa::path(
    post,
    path = "/agent/topics",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Event stream of `{\"text\"}` frames", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing book title", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn topics_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Response, HandlerError> {
    let request = parse_body(payload)?;
    stream_content(state, request, PromptTemplate::Topics).await
}

/// Stream a presenter's draft for a book, optionally built on the caller's notes.
#[utoipa::path(
    post,
    path = "/agent/draft",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Event stream of `{\"text\"}` frames", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing book title", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn draft_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Response, HandlerError> {
    let request = parse_body(payload)?;
    stream_content(state, request, PromptTemplate::Draft).await
}

async fn stream_content(
    state: Arc<AppState>,
    request: ContentRequest,
    template: PromptTemplate,
) -> Result<Response, HandlerError> {
    let subject = request
        .subject_metadata
        .and_then(SubjectMetadataPayload::into_domain)
        .ok_or(HandlerError::Validation(SUBJECT_REQUIRED))?;

    let mut opening = content_request(template, &subject);
    if template == PromptTemplate::Draft {
        if let Some(notes) = request.user_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            opening.push_str("\n\nMy notes:\n");
            opening.push_str(notes);
        }
    }

    let tokens = state
        .generator
        .generate_stream(GenerationRequest {
            system_prompt: system_prompt(template, Some(&subject)),
            messages: vec![Message::user(opening)],
            model: state.config.analysis_model.clone(),
            max_tokens: None,
        })
        .await
        .map_err(HandlerError::generation)?;

    Ok(relay(tokens, None).into_response())
}

//=========================================================================================
// Summarize (blocking)
//=========================================================================================

/// Summarise an interview into a reading reflection.
#[utoipa::path(
    post,
    path = "/agent/summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "The summary and the saved record, if any", body = SummarizeResponse),
        (status = 400, description = "Missing or invalid messages", body = ErrorResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse),
        (status = 500, description = "Generation unavailable", body = ErrorResponse)
    )
)]
pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, HandlerError> {
    let owner_id = caller.0.ok_or(HandlerError::Unauthorized)?;
    let request = parse_body(payload)?;
    let messages = into_messages(
        request
            .messages
            .ok_or(HandlerError::Validation(MESSAGES_REQUIRED))?,
    );
    let subject = request
        .subject_metadata
        .and_then(SubjectMetadataPayload::into_domain);

    let summary = summarize(
        state.generator.as_ref(),
        SummarizeInput {
            messages: &messages,
            existing_summary: request.existing_summary.as_deref(),
            subject: subject.as_ref(),
            model: &state.config.analysis_model,
            max_tokens: Some(state.config.summary_max_tokens),
        },
    )
    .await
    .map_err(HandlerError::generation)?;

    let record_id = match (request.save_as_record, request.subject_id) {
        (true, Some(subject_id)) => {
            match state.db.create_record(owner_id, subject_id, &summary).await {
                Ok(id) => Some(id),
                Err(e) => {
                    error!("Failed to save summary as a record: {}", e);
                    None
                }
            }
        }
        _ => None,
    };

    Ok(Json(SummarizeResponse { summary, record_id }))
}

//=========================================================================================
// Conversation Listing
//=========================================================================================

/// List the caller's saved conversations, most recently updated first.
#[utoipa::path(
    get,
    path = "/agent/conversations",
    params(ConversationsQuery),
    responses(
        (status = 200, description = "The caller's conversations", body = ConversationListResponse),
        (status = 400, description = "Unknown conversation type", body = ErrorResponse),
        (status = 401, description = "Sign-in required", body = ErrorResponse)
    )
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<ConversationListResponse>, HandlerError> {
    let owner_id = caller.0.ok_or(HandlerError::Unauthorized)?;

    let kind = match query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(raw) => Some(
            ConversationKind::parse(raw)
                .ok_or(HandlerError::Validation(UNKNOWN_CONVERSATION_TYPE))?,
        ),
        None => None,
    };
    let limit = parse_limit(query.limit.as_deref());

    let conversations = state
        .conversations
        .list(owner_id, kind, limit)
        .await
        .map_err(HandlerError::internal)?;

    Ok(Json(ConversationListResponse {
        conversations: conversations
            .into_iter()
            .map(ConversationSummaryPayload::from)
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_when_absent_or_garbage() {
        assert_eq!(parse_limit(None), 20);
        assert_eq!(parse_limit(Some("abc")), 20);
        assert_eq!(parse_limit(Some("")), 20);
        assert_eq!(parse_limit(Some("0")), 20);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(parse_limit(Some("999")), 100);
        assert_eq!(parse_limit(Some("-5")), 1);
        assert_eq!(parse_limit(Some("100")), 100);
        assert_eq!(parse_limit(Some("1")), 1);
        assert_eq!(parse_limit(Some("99999999999999999999999")), 100);
    }

    #[test]
    fn limit_uses_leading_integer() {
        assert_eq!(parse_limit(Some("12abc")), 12);
        assert_eq!(parse_limit(Some(" 7 ")), 7);
        assert_eq!(parse_limit(Some("3.9")), 3);
    }
}
