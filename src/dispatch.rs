//! Fan-out of an alert to the channels a user has enabled.
//!
//! Channels are independent: web push and Telegram run concurrently and a
//! failure on one never prevents the other, nor the in-app entry. Remote
//! sends go through a single [`RetryPolicy`].

use crate::ports::push::PushSender;
use crate::ports::telegram::TelegramSender;
use crate::ports::time::TimeProvider;
use crate::store::Store;
use crate::templates::{AdviceMessage, AlertMessage, alert_title};
use crate::types::advice::Advice;
use crate::types::event::SeismicEvent;
use crate::types::inbox::InAppKind;
use crate::types::user::User;

use askama::Template;
use std::time::Duration;

/// Waits between attempts; the number of delays is the number of retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub async fn run<T, F, Fut, E>(&self, time: &T, channel: &str, mut attempt: F) -> Result<(), E>
    where
        T: TimeProvider,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let mut retries = self.delays.iter();
        loop {
            match attempt().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let Some(delay) = retries.next() else {
                        return Err(err);
                    };
                    tracing::warn!(channel, error = %err, ?delay, "delivery attempt failed, retrying");
                    time.sleep(*delay).await;
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("telegram is not configured")]
    TelegramUnavailable,
    #[error("telegram delivery failed: {0}")]
    Telegram(String),
}

/// What to tell a user about one event.
#[derive(Debug, Clone, Copy)]
pub struct Alert<'a> {
    pub event: &'a SeismicEvent,
    pub distance_km: Option<f64>,
    pub advice: Option<&'a Advice>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub push_sent: usize,
    pub push_failed: usize,
    pub push_permission_missing: bool,
    pub in_app: bool,
    pub telegram_sent: usize,
    pub telegram_failed: usize,
}

#[derive(Debug, Default)]
struct PushOutcome {
    sent: usize,
    failed: usize,
    permission_missing: bool,
}

#[derive(Debug, Default)]
struct TelegramOutcome {
    sent: usize,
    failed: usize,
}

struct RenderedAlert {
    title: String,
    alert: String,
    advice: Option<String>,
    advice_summary: Option<String>,
}

impl RenderedAlert {
    fn full_text(&self) -> String {
        match &self.advice {
            Some(advice) => format!("{}\n\n{advice}", self.alert),
            None => self.alert.clone(),
        }
    }

    fn push_payload(&self, event_id: &str) -> String {
        let body = match &self.advice_summary {
            Some(summary) => format!("{}\n{summary}", self.alert),
            None => self.alert.clone(),
        };
        serde_json::json!({
            "title": self.title,
            "body": body,
            "eventId": event_id,
        })
        .to_string()
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher<P, G, T> {
    push: Option<P>,
    telegram: Option<G>,
    store: Store,
    time: T,
    retry: RetryPolicy,
}

impl<P, G, T> NotificationDispatcher<P, G, T>
where
    P: PushSender,
    G: TelegramSender,
    T: TimeProvider,
{
    pub fn new(
        push: Option<P>,
        telegram: Option<G>,
        store: Store,
        time: T,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            push,
            telegram,
            store,
            time,
            retry,
        }
    }

    pub fn push_enabled(&self) -> bool {
        self.push.is_some()
    }

    pub fn telegram_enabled(&self) -> bool {
        self.telegram.is_some()
    }

    /// Delivers `alert` to `user` on every enabled channel. Never fails;
    /// per-channel errors are logged and counted in the report.
    pub async fn dispatch(&self, user: &User, alert: Alert<'_>) -> DispatchReport {
        let rendered = render(user, alert);
        let event_id = alert.event.event_id.as_str();

        let (push, telegram) = tokio::join!(
            self.send_push(user, &rendered, event_id),
            self.send_telegram(user, &rendered, event_id),
        );

        let now = self.time.now();
        let labels = user.language.labels();
        if push.permission_missing
            && let Err(err) = self.store.push_inbox(
                user.id,
                InAppKind::PushPermissionMissing,
                event_id,
                labels.push_permission_title.to_string(),
                labels.push_permission_body.to_string(),
                now,
            )
        {
            tracing::error!(user = user.id, error = %err, "failed to store push permission notice");
        }

        let in_app = match self.store.push_inbox(
            user.id,
            InAppKind::Alert,
            event_id,
            rendered.title.clone(),
            rendered.full_text(),
            now,
        ) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(user = user.id, event_id, error = %err, "failed to store in-app alert");
                false
            }
        };

        DispatchReport {
            push_sent: push.sent,
            push_failed: push.failed,
            push_permission_missing: push.permission_missing,
            in_app,
            telegram_sent: telegram.sent,
            telegram_failed: telegram.failed,
        }
    }

    async fn send_push(&self, user: &User, rendered: &RenderedAlert, event_id: &str) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        if !user.preferences().push_enabled {
            return outcome;
        }
        if user.subscriptions.is_empty() {
            tracing::info!(user = user.id, "push enabled but no subscription registered");
            outcome.permission_missing = true;
            return outcome;
        }
        let Some(sender) = &self.push else {
            tracing::debug!(user = user.id, "push transport not configured, skipping");
            return outcome;
        };

        let payload = rendered.push_payload(event_id);
        for subscription in &user.subscriptions {
            let result = self
                .retry
                .run(&self.time, "push", || sender.send(subscription, &payload))
                .await;
            match result {
                Ok(()) => outcome.sent += 1,
                Err(err) => {
                    outcome.failed += 1;
                    tracing::error!(
                        user = user.id,
                        event_id,
                        endpoint = %subscription.endpoint,
                        error = %err,
                        "push delivery failed"
                    );
                }
            }
        }
        outcome
    }

    async fn send_telegram(
        &self,
        user: &User,
        rendered: &RenderedAlert,
        event_id: &str,
    ) -> TelegramOutcome {
        let mut outcome = TelegramOutcome::default();
        let Some(chat_id) = user.preferences().telegram_chat() else {
            return outcome;
        };
        let Some(sender) = &self.telegram else {
            tracing::debug!(user = user.id, "telegram transport not configured, skipping");
            return outcome;
        };

        let messages = std::iter::once(&rendered.alert).chain(rendered.advice.as_ref());
        for text in messages {
            let result = self
                .retry
                .run(&self.time, "telegram", || sender.send_message(chat_id, text))
                .await;
            match result {
                Ok(()) => outcome.sent += 1,
                Err(err) => {
                    outcome.failed += 1;
                    tracing::error!(user = user.id, chat_id, event_id, error = %err, "telegram delivery failed");
                }
            }
        }
        outcome
    }

    /// Sends free text to one chat with the dispatch retry policy.
    pub async fn send_telegram_text(&self, chat_id: i64, text: &str) -> Result<(), DispatchError> {
        let sender = self
            .telegram
            .as_ref()
            .ok_or(DispatchError::TelegramUnavailable)?;
        self.retry
            .run(&self.time, "telegram", || sender.send_message(chat_id, text))
            .await
            .map_err(|err| DispatchError::Telegram(err.to_string()))
    }

    /// Sends the same text to many chats; one failing chat does not stop the rest.
    pub async fn broadcast_telegram(&self, chat_ids: &[i64], text: &str) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;
        for &chat_id in chat_ids {
            match self.send_telegram_text(chat_id, text).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    failed += 1;
                    tracing::error!(chat_id, error = %err, "telegram broadcast failed for recipient");
                }
            }
        }
        (sent, failed)
    }
}

fn render(user: &User, alert: Alert<'_>) -> RenderedAlert {
    let language = user.language;
    let title = alert_title(alert.event, language);
    let text = AlertMessage::new(alert.event, alert.distance_km, language)
        .render()
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to render alert message");
            title.clone()
        });
    let advice = alert.advice.and_then(|advice| {
        AdviceMessage::new(advice, language)
            .render()
            .map_err(|err| tracing::error!(error = %err, "failed to render advice message"))
            .ok()
    });
    RenderedAlert {
        title,
        alert: text,
        advice,
        advice_summary: alert.advice.map(|advice| advice.general.clone()),
    }
}
