use crate::advice::AdviceCatalog;
use crate::app::auth::CurrentUser;
use crate::app::{ApiError, StatusResponse, api_error};
use crate::dispatch::DispatchError;
use crate::i18n::Language;
use crate::state;
use crate::templates::{AdviceMessage, AlertMessage};
use crate::types::advice::Advice;
use crate::types::event::SeismicEvent;

use askama::Template;
use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const BOT_LANGUAGE: Language = Language::En;

const HELP_TEXT: &str = "SafeQuake Alert bot\n\
/start - show the chat id to enter in your profile\n\
/latest - most recent event detected\n\
/advice <magnitude> - safety advice for a magnitude\n\
/help - this message";

fn dispatch_error(err: DispatchError) -> ApiError {
    match err {
        DispatchError::TelegramUnavailable => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, "Telegram is not configured.")
        }
        DispatchError::Telegram(reason) => {
            tracing::warn!(%reason, "telegram send failed");
            api_error(StatusCode::BAD_GATEWAY, "Failed to send Telegram message.")
        }
    }
}

fn render_error(err: askama::Error) -> ApiError {
    tracing::error!(error = %err, "failed to render message");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to render message")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendAlertRequest {
    event: SeismicEvent,
    distanza: Option<f64>,
    id_telegram: i64,
}

pub(crate) async fn send_alert(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SendAlertRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user = current.load(&state)?;
    let distance = request.distanza.filter(|km| km.is_finite());
    let text = AlertMessage::new(&request.event, distance, user.language)
        .render()
        .map_err(render_error)?;
    state
        .dispatcher
        .send_telegram_text(request.id_telegram, &text)
        .await
        .map_err(dispatch_error)?;
    Ok(Json(StatusResponse { status: "sent" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendAdviceRequest {
    id_telegram: i64,
    /// The advice record to render.
    message: Option<Advice>,
    /// Free text sent ahead of the advice.
    msg: Option<String>,
}

pub(crate) async fn send_advice(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SendAdviceRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user = current.load(&state)?;
    let mut parts = Vec::new();
    if let Some(msg) = request.msg.as_deref().map(str::trim).filter(|msg| !msg.is_empty()) {
        parts.push(msg.to_string());
    }
    if let Some(advice) = &request.message {
        parts.push(
            AdviceMessage::new(advice, user.language)
                .render()
                .map_err(render_error)?,
        );
    }
    if parts.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "message or msg is required",
        ));
    }

    state
        .dispatcher
        .send_telegram_text(request.id_telegram, &parts.join("\n\n"))
        .await
        .map_err(dispatch_error)?;
    Ok(Json(StatusResponse { status: "sent" }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncomingMessage {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Chat {
    id: i64,
}

/// Answers bot commands. Updates must carry the secret registered with
/// `setWebhook`; once verified, every update is acknowledged with 200 so
/// Telegram does not redeliver it.
pub(crate) async fn webhook(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<Json<StatusResponse>, ApiError> {
    let expected = state
        .config
        .telegram
        .as_ref()
        .and_then(|telegram| telegram.webhook_secret.as_deref());
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    let verified = match (expected, provided) {
        (Some(expected), Some(provided)) => secrets_match(expected, provided),
        _ => false,
    };
    if !verified {
        tracing::warn!("rejected telegram update without a valid secret token");
        return Err(api_error(StatusCode::UNAUTHORIZED, "unauthorized"));
    }

    let Some(IncomingMessage {
        chat,
        text: Some(text),
    }) = update.message
    else {
        return Ok(Json(StatusResponse { status: "ignored" }));
    };

    let latest = state
        .monitor
        .lock()
        .expect("monitor status lock")
        .latest_event
        .clone();
    let reply = bot_reply(&text, chat.id, latest.as_ref(), &state.catalog);
    if let Err(err) = state.dispatcher.send_telegram_text(chat.id, &reply).await {
        tracing::warn!(chat_id = chat.id, error = %err, "failed to answer bot command");
    }
    Ok(Json(StatusResponse { status: "ok" }))
}

/// Compares in time independent of where the first mismatch is.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    expected.len() == provided.len()
        && expected
            .iter()
            .zip(provided)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

fn bot_reply(
    text: &str,
    chat_id: i64,
    latest: Option<&SeismicEvent>,
    catalog: &AdviceCatalog,
) -> String {
    let mut words = text.split_whitespace();
    let command = words
        .next()
        .map(|word| word.split('@').next().unwrap_or(word))
        .unwrap_or_default();

    match command {
        "/start" => format!(
            "Welcome to SafeQuake Alert.\nYour Telegram id is {chat_id}. \
             Enter it in your profile to receive alerts here."
        ),
        "/latest" => match latest {
            Some(event) => AlertMessage::new(event, None, BOT_LANGUAGE)
                .render()
                .unwrap_or_else(|err| {
                    tracing::error!(error = %err, "failed to render alert message");
                    event.place.clone()
                }),
            None => "No events detected yet.".to_string(),
        },
        "/advice" => {
            let Some(magnitude) = words.next().and_then(|raw| raw.replace(',', ".").parse::<f64>().ok())
            else {
                return "Usage: /advice <magnitude>, for example /advice 4.5".to_string();
            };
            match catalog.select(magnitude) {
                Some(advice) => AdviceMessage::new(advice, BOT_LANGUAGE)
                    .render()
                    .unwrap_or_else(|err| {
                        tracing::error!(error = %err, "failed to render advice message");
                        advice.general.clone()
                    }),
                None => format!("No advice available for magnitude {magnitude}."),
            }
        }
        _ => HELP_TEXT.to_string(),
    }
}
