//! services/api/src/web/auth.rs
//!
//! Email and password accounts. A successful signup or login sets the
//! `session` cookie that [`crate::web::middleware::resolve_identity`] reads.

use crate::web::middleware::{
    expired_session_cookie, session_cookie, session_id_from_headers, session_lifetime,
};
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use quran_companion_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

type AuthResult<T> = Result<T, (StatusCode, String)>;

#[derive(Deserialize, ToSchema)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

fn internal(what: &str) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {}", what))
}

fn already_registered() -> (StatusCode, String) {
    (StatusCode::CONFLICT, "Email already registered".to_string())
}

/// Normalizes the email and enforces the minimum password length.
fn validate(credentials: &Credentials) -> AuthResult<String> {
    let email = credentials.email.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err((StatusCode::BAD_REQUEST, "A valid email is required".to_string()));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(email)
}

fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            internal("hash password")
        })
}

fn password_matches(password: &str, stored_hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Stored password hash is unreadable: {:?}", e);
        internal("verify password")
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Opens a session for `user_id` and returns its `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid) -> AuthResult<String> {
    let session_id = Uuid::new_v4().to_string();
    state
        .db
        .create_auth_session(&session_id, user_id, Utc::now() + session_lifetime())
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            internal("create session")
        })?;
    Ok(session_cookie(&session_id))
}

/// POST /auth/signup - Create an account and sign in
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = Credentials,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Malformed email or short password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> AuthResult<impl IntoResponse> {
    let email = validate(&credentials)?;

    match state.db.get_user_by_email(&email).await {
        Ok(_) => return Err(already_registered()),
        Err(PortError::NotFound(_)) => {}
        Err(e) => {
            error!("Failed to look up user: {:?}", e);
            return Err(internal("create account"));
        }
    }

    let hashed = hash_password(&credentials.password)?;
    let user = state
        .db
        .create_user_with_email(&email, &hashed)
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent signup for the same email.
            PortError::Conflict(_) => already_registered(),
            e => {
                error!("Failed to create user: {:?}", e);
                internal("create account")
            }
        })?;
    let cookie = start_session(&state, user.user_id).await?;
    info!("New account {}", user.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: user.user_id,
            email: user.email.unwrap_or(email),
        }),
    ))
}

/// POST /auth/login - Sign in with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> AuthResult<impl IntoResponse> {
    let email = credentials.email.trim().to_lowercase();
    let stored = match state.db.get_user_by_email(&email).await {
        Ok(stored) => stored,
        Err(PortError::NotFound(_)) => {
            return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
        }
        Err(e) => {
            error!("Failed to look up user: {:?}", e);
            return Err(internal("sign in"));
        }
    };

    if !password_matches(&credentials.password, &stored.hashed_password)? {
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    }

    let cookie = start_session(&state, stored.user_id).await?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: stored.user_id,
            email: stored.email,
        }),
    ))
}

/// POST /auth/logout - End the current session
///
/// Always clears the cookie, even when no session was active.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse> {
    if let Some(session_id) = session_id_from_headers(&headers) {
        state.db.delete_auth_session(session_id).await.map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            internal("sign out")
        })?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie())],
    ))
}
