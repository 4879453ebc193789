// Sign-in endpoint handlers and the session extractor

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{WatchError, WatchResult};
use crate::handlers::AppState;
use crate::models::{CheckEmailResponse, SessionResponse, SignInRequest, SignInResponse, VerifyQuery};
use crate::services::session_service::Session;

pub const SESSION_COOKIE: &str = "watch_session";

/// Session id carried by the request's cookie header, if any
fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn session_cookie_header(state: &AppState, value: &str, max_age_secs: u64) -> String {
    let secure = if state.config.secure_cookies {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE, value, max_age_secs, secure
    )
}

fn session_response(session: &Session) -> SessionResponse {
    SessionResponse {
        user_id: session.user_id,
        email: session.email.clone(),
        expires_at: session.expires_at.to_rfc3339(),
    }
}

/// Signed-in session of the caller; rejects with 401 otherwise
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = WatchError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = session_cookie(&parts.headers).ok_or(WatchError::Unauthorized)?;
        state
            .sessions
            .session(id)
            .await
            .map(CurrentSession)
            .ok_or(WatchError::Unauthorized)
    }
}

/// POST /api/check-email-allowed - Report whether an email is on the allow-list.
/// Open to any caller, so it reveals membership of the submitted address.
pub async fn check_email_allowed(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> WatchResult<Json<CheckEmailResponse>> {
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| WatchError::InvalidRequest("Email must be a string.".to_string()))?;

    Ok(Json(CheckEmailResponse {
        is_allowed: state.sessions.allow_list().is_allowed(email),
    }))
}

/// POST /auth/sign-in - Send a magic link to an allow-listed email
pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> WatchResult<Json<SignInResponse>> {
    state.sessions.request_sign_in(&body.email).await?;

    Ok(Json(SignInResponse {
        sent: true,
        resend_after_secs: state.sessions.resend_cooldown_secs(),
    }))
}

/// GET /auth/verify?token= - Exchange a magic-link token for a session cookie
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> WatchResult<impl IntoResponse> {
    let session = state.sessions.verify(&params.token).await?;
    let cookie = session_cookie_header(
        &state,
        &session.id.to_string(),
        state.config.session_ttl_secs,
    );

    Ok(([(header::SET_COOKIE, cookie)], Json(session_response(&session))))
}

/// GET /auth/session - Current session details
pub async fn get_session(CurrentSession(session): CurrentSession) -> Json<SessionResponse> {
    Json(session_response(&session))
}

/// POST /auth/sign-out - End the session and drop the watched address state
pub async fn sign_out(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> impl IntoResponse {
    state.sessions.sign_out(session.id).await;
    state.dashboard.clear(session.user_id).await;
    tracing::info!("User {} signed out", session.user_id);

    let cookie = session_cookie_header(&state, "", 0);
    ([(header::SET_COOKIE, cookie)], Json(serde_json::json!({ "signed_out": true })))
}
