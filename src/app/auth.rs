use crate::app::{ApiError, api_error, store_error};
use crate::auth;
use crate::i18n::Language;
use crate::state;
use crate::store::NewUser;
use crate::types::user::{User, UserProfile};

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 8;

/// Id of the user a verified bearer token belongs to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurrentUser(pub(crate) u64);

impl CurrentUser {
    pub(crate) fn load(self, state: &state::AppState) -> Result<User, ApiError> {
        state
            .store
            .user(self.0)
            .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if is_public(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    if let Some(token) = bearer_token(req.headers())
        && let Ok(user_id) = state.auth.verify_token(token)
    {
        req.extensions_mut().insert(CurrentUser(user_id));
        return next.run(req).await;
    }

    api_error(StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

fn is_public(method: &Method, path: &str) -> bool {
    path == "/health"
        || path == "/api/auth/login"
        || (path == "/api/users" && method == Method::POST)
        || path == "/api/advices"
        || path.starts_with("/api/advices/")
        || path == "/api/push/public-key"
        || path == "/api/telegram/webhook"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    language: Option<Language>,
}

pub(crate) async fn register(
    State(state): State<state::AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let name = request.name.trim();
    let email = request.email.trim();
    if name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "name is required"));
    }
    if !is_plausible_email(email) {
        return Err(api_error(StatusCode::BAD_REQUEST, "email is invalid"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    let password_hash = auth::hash_password(&request.password).map_err(|err| {
        tracing::error!(error = %err, "password hashing failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to register")
    })?;
    let user = state
        .store
        .create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            language: request.language.unwrap_or_default(),
        })
        .map_err(store_error)?;
    tracing::info!(user = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub(crate) struct LoginResponse {
    token: String,
    user: UserProfile,
}

pub(crate) async fn login(
    State(state): State<state::AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || api_error(StatusCode::UNAUTHORIZED, "invalid email or password");

    let user = state.store.user_by_email(&request.email).ok_or_else(invalid)?;
    if !auth::verify_password(&request.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = state.auth.issue_token(user.id).map_err(|err| {
        tracing::error!(error = %err, "failed to issue auth token");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to sign in")
    })?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}
