//! services/api/src/web/middleware.rs
//!
//! Identity pre-check and request helpers shared by the handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use reading_club_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

/// Cookie carrying the login session issued by the record keeper.
pub const SESSION_COOKIE: &str = "session";

/// The caller's identity, or `None` for anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Option<Uuid>);

/// Middleware that resolves the auth session cookie to a user id.
///
/// It never rejects: the resolved `Caller` is inserted into the request
/// extensions and each handler decides whether anonymous callers are allowed.
pub async fn identify(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let caller = match cookie_value(req.headers(), SESSION_COOKIE) {
        Some(session_id) => match state.db.validate_auth_session(session_id).await {
            Ok(user_id) => Some(user_id),
            Err(PortError::Unauthorized) => {
                debug!("Ignoring unknown or expired auth session.");
                None
            }
            Err(e) => {
                error!("Failed to validate auth session: {:?}", e);
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(Caller(caller));
    next.run(req).await
}

/// Finds a cookie by name in the `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// The rate-limit key: the first `x-forwarded-for` hop, else `"unknown"`.
pub fn caller_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; club_id=9"),
        );
        assert_eq!(cookie_value(&headers, "session"), Some("abc-123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn caller_key_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_key(&headers), "unknown");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(caller_key(&headers), "203.0.113.7");
    }
}
