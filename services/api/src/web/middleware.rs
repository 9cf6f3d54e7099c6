//! services/api/src/web/middleware.rs
//!
//! Resolves the optional signed-in identity behind every request.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use quran_companion_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

const SESSION_COOKIE: &str = "session";

/// The caller's user id, or `None` for anonymous readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Option<Uuid>);

/// Lifetime of a sign-in.
pub fn session_lifetime() -> Duration {
    Duration::days(30)
}

/// Pulls the `session=` value out of the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(session_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE,
        session_id,
        session_lifetime().num_seconds()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{}=; HttpOnly; Secure; Path=/; Max-Age=0; SameSite=Lax", SESSION_COOKIE)
}

/// Attaches a [`CurrentUser`] to the request. Never rejects: a missing,
/// expired or unknown session simply reads as anonymous.
pub async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // `req` must not stay borrowed across the await.
    let session_id = session_id_from_headers(req.headers()).map(str::to_string);
    let user_id = match session_id {
        Some(session_id) => match state.db.validate_auth_session(&session_id).await {
            Ok(user_id) => Some(user_id),
            Err(PortError::Unauthorized) => {
                debug!("Session cookie did not match a live session");
                None
            }
            Err(e) => {
                error!("Failed to validate auth session: {:?}", e);
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(CurrentUser(user_id));
    next.run(req).await
}
