pub mod adapters;
pub mod advice;
mod app;
pub mod auth;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod feed;
pub mod geo;
pub mod i18n;
pub mod monitor;
pub mod poller;
pub mod ports;
pub mod push;
pub mod recorder;
pub mod state;
pub mod store;
mod templates;
pub mod types;

pub use app::app;
pub use push::generate_vapid_credentials;

use crate::adapters::{
    FdsnFeedClient, FileStateStore, MemoryStateStore, TelegramBotClient, TokioTimeProvider,
    WebPushSender,
};
use crate::dedup::DeduplicationGate;
use crate::monitor::ProximityFlow;
use crate::poller::{EventPoller, SharedStatus};
use crate::ports::state::StateStore;
use crate::recorder::SeismicEventRecorder;
use crate::state::{AppState, StartupError};

use std::net::SocketAddr;
use tokio::task::JoinHandle;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> Result<(), StartupError> {
    let state = AppState::build(config)?;
    let monitor = spawn_monitor(&state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    let result = axum::serve(listener, app(state)).await;
    if let Some(monitor) = monitor {
        monitor.abort();
    }
    Ok(result?)
}

fn spawn_monitor(state: &AppState) -> Result<Option<JoinHandle<()>>, StartupError> {
    if !state.config.monitor_enabled {
        tracing::info!("seismic monitor disabled");
        return Ok(None);
    }
    let feed = FdsnFeedClient::new(state.config.feed.url.clone())?;
    let poller = EventPoller::new(feed, TokioTimeProvider, state.config.feed.clone());
    let handle = match state.config.state_path() {
        Some(path) => start_poller(state, poller, FileStateStore::new(path)),
        None => start_poller(state, poller, MemoryStateStore::default()),
    };
    Ok(Some(handle))
}

fn start_poller<S: StateStore>(
    state: &AppState,
    poller: EventPoller<FdsnFeedClient, TokioTimeProvider>,
    markers: S,
) -> JoinHandle<()> {
    let gate = DeduplicationGate::new(markers);
    restore_latest_event(&gate, &state.monitor);
    poller.spawn(proximity_flow(state, gate), state.monitor.clone())
}

/// Shows the last notified event until the first poll completes.
fn restore_latest_event<S: StateStore>(gate: &DeduplicationGate<S>, status: &SharedStatus) {
    match gate.last_notified() {
        Ok(Some(event)) => {
            tracing::info!(event_id = %event.event_id, "restored last notified event");
            status.lock().expect("monitor status lock").latest_event = Some(event);
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "failed to read last notified event"),
    }
}

fn proximity_flow<S: StateStore>(
    state: &AppState,
    gate: DeduplicationGate<S>,
) -> ProximityFlow<S, WebPushSender, TelegramBotClient, TokioTimeProvider> {
    ProximityFlow::new(
        gate,
        state.store.clone(),
        state.catalog.clone(),
        state.dispatcher.clone(),
        SeismicEventRecorder::new(state.store.clone(), state.config.record_radius_km),
        TokioTimeProvider,
        state.config.alert_radius_km,
    )
}

/// Sends `text` to every user who linked a Telegram chat and enabled it.
/// Returns how many chats were reached and how many failed.
pub async fn broadcast(
    config: config::AppConfig,
    text: &str,
) -> Result<(usize, usize), StartupError> {
    let state = AppState::build(config)?;
    if !state.dispatcher.telegram_enabled() {
        return Err(StartupError::TelegramDisabled);
    }

    let mut chat_ids: Vec<i64> = state
        .store
        .users()
        .iter()
        .filter_map(|user| user.preferences().telegram_chat())
        .collect();
    chat_ids.sort_unstable();
    chat_ids.dedup();

    let (sent, failed) = state.dispatcher.broadcast_telegram(&chat_ids, text).await;
    tracing::info!(sent, failed, "telegram broadcast finished");
    Ok((sent, failed))
}

/// Forgets the last notified event, so the next poll alerts on it again.
pub fn reset_marker(config: &config::AppConfig) -> Result<(), StartupError> {
    let path = config.state_path().ok_or(StartupError::NoDataDir)?;
    DeduplicationGate::new(FileStateStore::new(path)).reset()?;
    tracing::info!("last notified event cleared");
    Ok(())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStateStore;
    use crate::adapters::telegram::tests::fake_bot_api;
    use crate::config::{AppConfig, TelegramConfig};
    use crate::dispatch::tests::test_event;
    use crate::store::Store;
    use crate::store::tests::{create_temp_dir, new_user};

    #[test]
    fn restore_latest_event__should_seed_monitor_status() {
        // Given
        let gate = DeduplicationGate::new(MemoryStateStore::default());
        gate.admit(&test_event()).expect("admit");
        let status = SharedStatus::default();

        // When
        restore_latest_event(&gate, &status);

        // Then
        let status = status.lock().expect("monitor status lock");
        assert_eq!(status.latest_event, Some(test_event()));
        assert!(status.last_poll_at.is_none());
    }

    #[test]
    fn reset_marker__should_clear_persisted_marker() {
        // Given
        let dir = create_temp_dir("reset-marker");
        let config = AppConfig {
            data_dir: Some(dir.clone()),
            ..Default::default()
        };
        let path = config.state_path().expect("state path");
        let gate = DeduplicationGate::new(FileStateStore::new(path));
        gate.admit(&test_event()).expect("admit");

        // When
        reset_marker(&config).expect("reset marker");

        // Then
        assert_eq!(gate.last_notified().expect("marker"), None);
        assert!(gate.admit(&test_event()).expect("admit"));

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn reset_marker__should_require_data_dir() {
        assert!(matches!(
            reset_marker(&AppConfig::default()),
            Err(StartupError::NoDataDir)
        ));
    }

    #[tokio::test]
    async fn broadcast__should_reach_each_linked_chat_once() {
        // Given
        let dir = create_temp_dir("broadcast");
        let (api_base, captured) = fake_bot_api().await;
        let config = AppConfig {
            data_dir: Some(dir.clone()),
            telegram: Some(TelegramConfig {
                token: "42:test-token".to_string(),
                api_base,
                webhook_secret: None,
            }),
            ..Default::default()
        };
        let store = Store::open(config.store_path().expect("store path")).expect("open store");
        for (email, chat, enabled) in [
            ("linked@example.com", Some(501), true),
            ("same-chat@example.com", Some(501), true),
            ("muted@example.com", Some(502), false),
            ("unlinked@example.com", None, true),
            ("other@example.com", Some(503), true),
        ] {
            let user = store.create_user(new_user(email)).expect("create user");
            store
                .update_preferences(user.id, |prefs, _| {
                    prefs.telegram_enabled = enabled;
                    prefs.telegram_id = chat;
                })
                .expect("update preferences");
        }

        // When
        let (sent, failed) = broadcast(config, "Maintenance tonight").await.expect("broadcast");

        // Then
        assert_eq!((sent, failed), (2, 0));
        let captured = captured.lock().expect("captured lock");
        let chats: Vec<i64> = captured
            .iter()
            .map(|(_, body)| body["chat_id"].as_i64().expect("chat id"))
            .collect();
        assert_eq!(chats, vec![501, 503]);
        assert_eq!(captured[0].1["text"], "Maintenance tonight");

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn broadcast__should_fail_without_telegram() {
        assert!(matches!(
            broadcast(AppConfig::default(), "hello").await,
            Err(StartupError::TelegramDisabled)
        ));
    }
}
