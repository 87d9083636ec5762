use crate::state;
use crate::store::StoreError;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post, put};
use serde::Serialize;

mod advices;
mod auth;
mod events;
mod notifications;
mod push;
mod telegram;
mod users;

pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users/me", get(users::me))
        .route("/api/users/me/place", put(users::update_place))
        .route(
            "/api/users/me/notifications",
            put(users::update_notifications),
        )
        .route(
            "/api/userTelegram",
            put(users::link_telegram).delete(users::unlink_telegram),
        )
        .route("/api/advices", get(advices::advice_list))
        .route("/api/advices/lookup", get(advices::advice_lookup))
        .route(
            "/api/seismicEvents",
            get(events::event_list).post(events::event_create),
        )
        .route("/api/seismicEvents/latest", get(events::event_latest))
        .route(
            "/api/seismicEvents/{id}",
            axum::routing::delete(events::event_delete),
        )
        .route("/api/telegram/sendAlert", post(telegram::send_alert))
        .route("/api/telegram/sendAdvice", post(telegram::send_advice))
        .route("/api/telegram/webhook", post(telegram::webhook))
        .route("/api/notifications", get(notifications::notification_list))
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(notifications::notification_delete),
        )
        .route("/api/push/public-key", get(push::push_public_key))
        .route(
            "/api/push/subscribe",
            post(push::push_subscribe).delete(push::push_unsubscribe),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::EmailTaken | StoreError::Duplicate { .. } => {
            api_error(StatusCode::CONFLICT, err.to_string())
        }
        StoreError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, err.to_string()),
        StoreError::Io(_) | StoreError::Json(_) => {
            tracing::error!(error = %err, "store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        }
    }
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}
