use crate::app::auth::CurrentUser;
use crate::app::{ApiError, StatusResponse, api_error, store_error};
use crate::state;
use crate::types::push::Subscription;

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let public_key = state.push_public_key.clone().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Push notifications are not configured.",
        )
    })?;
    Ok(Json(PublicKeyResponse { public_key }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionKeys {
    p256dh: String,
    auth: String,
}

/// Shape of `PushSubscription.toJSON()` in the browser.
#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    endpoint: String,
    keys: SubscriptionKeys,
}

pub(crate) async fn push_subscribe(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let endpoint = request.endpoint.trim();
    let p256dh = request.keys.p256dh.trim();
    let auth = request.keys.auth.trim();
    if endpoint.is_empty() || p256dh.is_empty() || auth.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "endpoint, p256dh, and auth are required.",
        ));
    }
    if !endpoint.starts_with("https://") {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "endpoint must be an https URL.",
        ));
    }

    state
        .store
        .add_subscription(
            current.0,
            Subscription {
                endpoint: endpoint.to_string(),
                p256dh: p256dh.to_string(),
                auth: auth.to_string(),
            },
        )
        .map_err(store_error)?;
    tracing::info!(user = current.0, "push subscription registered");

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse {
            status: "subscribed",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnsubscribeRequest {
    endpoint: String,
}

pub(crate) async fn push_unsubscribe(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let removed = state
        .store
        .remove_subscription(current.0, request.endpoint.trim())
        .map_err(store_error)?;
    if !removed {
        return Err(api_error(StatusCode::NOT_FOUND, "subscription not found"));
    }
    Ok(Json(StatusResponse {
        status: "unsubscribed",
    }))
}
