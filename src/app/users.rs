use crate::app::auth::CurrentUser;
use crate::app::{ApiError, api_error, store_error};
use crate::i18n::Language;
use crate::state;
use crate::types::user::{Place, UserProfile};

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

pub(crate) async fn me(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = current.load(&state)?;
    Ok(Json(UserProfile::from(&user)))
}

pub(crate) async fn update_place(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(place): Json<Place>,
) -> Result<Json<UserProfile>, ApiError> {
    validate_place(&place).map_err(|message| api_error(StatusCode::BAD_REQUEST, message))?;
    let user = state
        .store
        .set_place(current.0, place)
        .map_err(store_error)?;
    Ok(Json(UserProfile::from(&user)))
}

fn validate_place(place: &Place) -> Result<(), &'static str> {
    match (place.latitude, place.longitude) {
        (Some(latitude), Some(longitude)) => {
            if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
                return Err("latitude must be between -90 and 90");
            }
            if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
                return Err("longitude must be between -180 and 180");
            }
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err("latitude and longitude must be set together"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationsRequest {
    push_enabled: Option<bool>,
    telegram_enabled: Option<bool>,
    language: Option<Language>,
}

pub(crate) async fn update_notifications(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<NotificationsRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .store
        .update_preferences(current.0, |preferences, language| {
            if let Some(push_enabled) = request.push_enabled {
                preferences.push_enabled = push_enabled;
            }
            if let Some(telegram_enabled) = request.telegram_enabled {
                preferences.telegram_enabled = telegram_enabled;
            }
            if let Some(requested) = request.language {
                *language = requested;
            }
        })
        .map_err(store_error)?;
    Ok(Json(UserProfile::from(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TelegramLinkRequest {
    #[serde(alias = "idTelegram")]
    telegram_id: i64,
    telegram_username: Option<String>,
}

pub(crate) async fn link_telegram(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<TelegramLinkRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .store
        .update_preferences(current.0, |preferences, _| {
            preferences.telegram_id = Some(request.telegram_id);
            preferences.telegram_username = request
                .telegram_username
                .map(|name| name.trim().trim_start_matches('@').to_string())
                .filter(|name| !name.is_empty());
            preferences.telegram_enabled = true;
        })
        .map_err(store_error)?;
    tracing::info!(user = user.id, "telegram linked");
    Ok(Json(UserProfile::from(&user)))
}

pub(crate) async fn unlink_telegram(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .store
        .update_preferences(current.0, |preferences, _| {
            preferences.telegram_id = None;
            preferences.telegram_username = None;
            preferences.telegram_enabled = false;
        })
        .map_err(store_error)?;
    Ok(Json(UserProfile::from(&user)))
}
