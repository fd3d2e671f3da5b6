//! services/api/src/web/rest.rs
//!
//! Builds the HTTP router and holds the master definition for the OpenAPI
//! specification.

use crate::web::{
    agent::{
        analysis_handler, chat_handler, draft_handler, interview_handler,
        list_conversations_handler, summarize_handler, topics_handler,
    },
    clubs::{create_club_handler, verify_club_handler},
    middleware::identify,
    protocol::{
        AnalysisRequest, AnalysisResponse, ContentRequest, ConversationListResponse,
        ConversationRequest, ConversationSummaryPayload, CreateClubRequest, CreateClubResponse,
        ErrorResponse, MessagePayload, RolePayload, SubjectMetadataPayload, SummarizeRequest,
        SummarizeResponse, VerifyClubRequest, VerifyClubResponse,
    },
    state::AppState,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::agent::analysis_handler,
        crate::web::agent::interview_handler,
        crate::web::agent::chat_handler,
        crate::web::agent::topics_handler,
        crate::web::agent::draft_handler,
        crate::web::agent::summarize_handler,
        crate::web::agent::list_conversations_handler,
        crate::web::clubs::create_club_handler,
        crate::web::clubs::verify_club_handler,
    ),
    components(
        schemas(
            AnalysisRequest, AnalysisResponse, ConversationRequest, ContentRequest,
            SummarizeRequest, SummarizeResponse, ConversationListResponse,
            ConversationSummaryPayload, CreateClubRequest, CreateClubResponse,
            VerifyClubRequest, VerifyClubResponse, MessagePayload, RolePayload,
            SubjectMetadataPayload, ErrorResponse
        )
    ),
    tags(
        (name = "Reading Club Assistant API", description = "AI assistant endpoints for the reading club.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// The complete application: every endpoint behind the identity pre-check,
/// plus the Swagger UI.
pub fn router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/agent/analysis", post(analysis_handler))
        .route("/agent/interview", post(interview_handler))
        .route("/agent/chat", post(chat_handler))
        .route("/agent/topics", post(topics_handler))
        .route("/agent/draft", post(draft_handler))
        .route("/agent/summarize", post(summarize_handler))
        .route("/agent/conversations", get(list_conversations_handler))
        .route("/club", post(create_club_handler))
        .route("/club/verify", post(verify_club_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), identify))
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/agent/analysis",
            "/agent/interview",
            "/agent/chat",
            "/agent/topics",
            "/agent/draft",
            "/agent/summarize",
            "/agent/conversations",
            "/club",
            "/club/verify",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
