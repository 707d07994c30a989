use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::AppendHeaders,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{AuthResponse, CredentialsRequest, PublicUser, RefreshRequest},
        extractors::AuthUser,
        services::{
            hash_password, is_valid_email, normalize_email, verify_password, JwtKeys, TokenKind,
            MIN_PASSWORD_LEN,
        },
    },
    error::{ApiError, AppJson},
    state::AppState,
};

type SessionCookies = AppendHeaders<[(HeaderName, String); 2]>;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
}

/// Signs a fresh access/refresh pair and renders both as `Set-Cookie` headers.
fn issue_session(state: &AppState, user_id: Uuid) -> Result<SessionCookies, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let secure = state.config.cookie_secure;
    let cookie = |kind: TokenKind| {
        keys.session_cookie(user_id, kind, secure).map_err(|e| {
            error!(error = %e, ?kind, "jwt sign failed");
            ApiError::Internal(e)
        })
    };
    Ok(AppendHeaders([
        (header::SET_COOKIE, cookie(TokenKind::Access)?),
        (header::SET_COOKIE, cookie(TokenKind::Refresh)?),
    ]))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> Result<(StatusCode, SessionCookies, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::invalid("Invalid email"));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::invalid("Password too short"));
    }

    // Ensure email is not taken
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let user = state.users.create(&email, &hash).await?;
    let session = issue_session(&state, user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        session,
        Json(AuthResponse { user: user.into() }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> Result<(SessionCookies, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::invalid("Invalid email"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash).map_err(ApiError::Internal)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let session = issue_session(&state, user.id)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((session, Json(AuthResponse { user: user.into() })))
}

#[instrument(skip(state, headers, body))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<AppJson<RefreshRequest>>,
) -> Result<(SessionCookies, Json<AuthResponse>), ApiError> {
    let token = cookies::read(&headers, REFRESH_COOKIE)
        .map(str::to_string)
        .or_else(|| body.map(|AppJson(b)| b.refresh_token))
        .ok_or_else(|| ApiError::unauthorized("Refresh token required"))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(&token, TokenKind::Refresh).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::unauthorized("Invalid or expired refresh token")
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let session = issue_session(&state, user.id)?;
    Ok((session, Json(AuthResponse { user: user.into() })))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> (SessionCookies, Json<serde_json::Value>) {
    let secure = state.config.cookie_secure;
    (
        AppendHeaders([
            (header::SET_COOKIE, cookies::cleared(ACCESS_COOKIE, secure)),
            (header::SET_COOKIE, cookies::cleared(REFRESH_COOKIE, secure)),
        ]),
        Json(json!({ "message": "Logged out" })),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        error!(%user_id, "user not found");
        ApiError::unauthorized("User not found")
    })?;
    Ok(Json(user.into()))
}
