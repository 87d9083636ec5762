use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::ports::telegram::TelegramSender;

use super::REQUEST_TIMEOUT;

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram returned HTTP {status}: {description}")]
    Api { status: u16, description: String },
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Bot API client. The token is part of every method URL, so URLs are never logged.
#[derive(Clone)]
pub struct TelegramBotClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TelegramBotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBotClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramBotClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn post_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();
        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(TelegramError::Api {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "request rejected".to_string()),
            }),
            None if status.is_success() => Ok(()),
            None => Err(TelegramError::Api {
                status: status.as_u16(),
                description: "unreadable response".to_string(),
            }),
        }
    }
}

impl TelegramSender for TelegramBotClient {
    type Error = TelegramError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn send_message<'a>(&'a self, chat_id: i64, text: &'a str) -> Self::Fut<'a> {
        Box::pin(self.post_message(chat_id, text))
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::routing::post;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    pub(crate) type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    /// A local stand-in for the Bot API that records every sendMessage call.
    pub(crate) async fn fake_bot_api() -> (String, Captured) {
        let captured = Captured::default();
        let recorder = Arc::clone(&captured);
        let router = Router::new().route(
            "/{bot}/sendMessage",
            post(
                move |axum::extract::Path(bot): axum::extract::Path<String>,
                      Json(body): Json<Value>| {
                    let recorder = Arc::clone(&recorder);
                    async move {
                        recorder.lock().expect("captured lock").push((bot, body));
                        Json(json!({ "ok": true, "result": {} }))
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake bot api");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake bot api");
        });
        (format!("http://{addr}"), captured)
    }


    #[test]
    fn method_url__should_embed_token_and_trim_base() {
        // Given
        let client = TelegramBotClient::new("https://api.telegram.org/", " 123:abc ").expect("client");

        // Then
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn debug__should_not_leak_token() {
        let client = TelegramBotClient::new(DEFAULT_TELEGRAM_API_BASE, "secret-token").expect("client");

        let debug = format!("{client:?}");

        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn send_message__should_post_chat_and_text() {
        // Given
        let (api_base, captured) = fake_bot_api().await;
        let client = TelegramBotClient::new(&api_base, "42:test-token").expect("client");

        // When
        client.send_message(7, "ciao").await.expect("send message");

        // Then
        let captured = captured.lock().expect("captured lock");
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0, "bot42:test-token");
        assert_eq!(captured[0].1, json!({ "chat_id": 7, "text": "ciao" }));
    }
}
