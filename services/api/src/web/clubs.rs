//! services/api/src/web/clubs.rs
//!
//! The two public, rate-limited club endpoints: creating a club and verifying
//! a club access code.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use reading_club_core::{domain::NewClub, ports::PortError};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::HandlerError;
use crate::web::{
    agent::parse_body,
    middleware::caller_key,
    protocol::{
        CreateClubRequest, CreateClubResponse, ErrorResponse, VerifyClubRequest,
        VerifyClubResponse,
    },
    state::AppState,
};

/// Cookie remembering the verified club on the client.
pub const CLUB_COOKIE: &str = "club_id";

pub const MIN_ACCESS_CODE_CHARS: usize = 2;
pub const MIN_ADMIN_PASSWORD_CHARS: usize = 4;

const CLUB_CREATE_LIMITED: &str = "Too many clubs created. Please try again later.";
const VERIFY_LIMITED: &str = "Too many attempts. Please try again in a minute.";
const CLUB_FIELDS_REQUIRED: &str = "Name, access code and admin password are required.";
const ACCESS_CODE_TOO_SHORT: &str = "The access code must be at least 2 characters.";
const ADMIN_PASSWORD_TOO_SHORT: &str = "The admin password must be at least 4 characters.";
const ACCESS_CODE_TAKEN: &str = "That access code is already in use.";
const ACCESS_CODE_REQUIRED: &str = "An access code is required.";
const UNKNOWN_ACCESS_CODE: &str = "No club matches that access code.";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a reading club.
#[utoipa::path(
    post,
    path = "/club",
    request_body = CreateClubRequest,
    responses(
        (status = 201, description = "Club created", body = CreateClubResponse),
        (status = 400, description = "Missing or too-short fields", body = ErrorResponse),
        (status = 409, description = "Access code already in use", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    )
)]
pub async fn create_club_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateClubRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let key = caller_key(&headers);
    if !state.club_create_limiter.allow(&key) {
        warn!("Club creation rate limit hit for {}.", key);
        return Err(HandlerError::RateLimited(CLUB_CREATE_LIMITED));
    }

    let request = parse_body(payload)?;
    let (Some(name), Some(access_code), Some(admin_password)) = (
        non_blank(request.name),
        non_blank(request.access_code),
        request.admin_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(HandlerError::Validation(CLUB_FIELDS_REQUIRED));
    };
    if access_code.chars().count() < MIN_ACCESS_CODE_CHARS {
        return Err(HandlerError::Validation(ACCESS_CODE_TOO_SHORT));
    }
    if admin_password.chars().count() < MIN_ADMIN_PASSWORD_CHARS {
        return Err(HandlerError::Validation(ADMIN_PASSWORD_TOO_SHORT));
    }

    let salt = SaltString::generate(&mut OsRng);
    let admin_password_hash = Argon2::default()
        .hash_password(admin_password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash admin password: {:?}", e);
            HandlerError::Internal
        })?
        .to_string();

    let club = state
        .db
        .create_club(NewClub {
            name,
            description: non_blank(request.description),
            access_code,
            admin_password_hash,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => HandlerError::Conflict(ACCESS_CODE_TAKEN),
            other => HandlerError::internal(other),
        })?;

    info!("Created club {} ({}).", club.name, club.id);
    Ok((StatusCode::CREATED, Json(CreateClubResponse { club_id: club.id })))
}

/// Verify a club access code and remember the club in a cookie.
#[utoipa::path(
    post,
    path = "/club/verify",
    request_body = VerifyClubRequest,
    responses(
        (status = 200, description = "Access code accepted", body = VerifyClubResponse),
        (status = 400, description = "Missing access code", body = ErrorResponse),
        (status = 404, description = "Unknown access code", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    )
)]
pub async fn verify_club_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<VerifyClubRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let key = caller_key(&headers);
    if !state.verify_limiter.allow(&key) {
        warn!("Access code verification rate limit hit for {}.", key);
        return Err(HandlerError::RateLimited(VERIFY_LIMITED));
    }

    let request = parse_body(payload)?;
    let access_code =
        non_blank(request.access_code).ok_or(HandlerError::Validation(ACCESS_CODE_REQUIRED))?;

    let club = state
        .db
        .find_club_by_access_code(&access_code)
        .await
        .map_err(HandlerError::internal)?
        .ok_or(HandlerError::NotFound(UNKNOWN_ACCESS_CODE))?;

    let cookie = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        CLUB_COOKIE,
        club.id,
        Duration::days(30).num_seconds()
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(VerifyClubResponse {
            club_id: club.id,
            club_name: club.name,
        }),
    ))
}
