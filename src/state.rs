use crate::adapters::{TelegramBotClient, TelegramError, TokioTimeProvider, WebPushSender};
use crate::advice::{AdviceCatalog, CatalogError};
use crate::auth::{AuthError, AuthState};
use crate::config::AppConfig;
use crate::dispatch::{NotificationDispatcher, RetryPolicy};
use crate::feed::FeedError;
use crate::poller::SharedStatus;
use crate::push;
use crate::store::{Store, StoreError};

use std::sync::Arc;

pub type AppDispatcher = NotificationDispatcher<WebPushSender, TelegramBotClient, TokioTimeProvider>;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid auth configuration: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
    #[error("invalid advice catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("failed to create telegram client: {0}")]
    Telegram(#[from] TelegramError),
    #[error("failed to create feed client: {0}")]
    Feed(#[from] FeedError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telegram is not configured")]
    TelegramDisabled,
    #[error("no data directory configured")]
    NoDataDir,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub(crate) auth: AuthState,
    pub store: Store,
    pub catalog: Arc<AdviceCatalog>,
    pub dispatcher: AppDispatcher,
    pub push_public_key: Option<String>,
    pub monitor: SharedStatus,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, StartupError> {
        let auth = AuthState::from_config(&config)?;
        let store = match config.store_path() {
            Some(path) => {
                if let Some(dir) = &config.data_dir {
                    std::fs::create_dir_all(dir)?;
                }
                Store::open(path)?
            }
            None => Store::in_memory(),
        };
        let catalog = Arc::new(AdviceCatalog::builtin()?);

        let push = push::build_push_sender(&config);
        let push_public_key = push.as_ref().map(|sender| sender.public_key().to_string());
        let telegram = match &config.telegram {
            Some(telegram) => {
                if telegram.webhook_secret.is_none() {
                    tracing::info!("telegram bot commands disabled: no webhook secret");
                }
                Some(TelegramBotClient::new(&telegram.api_base, &telegram.token)?)
            }
            None => {
                tracing::info!("telegram notifications disabled: no bot token");
                None
            }
        };
        let dispatcher = NotificationDispatcher::new(
            push,
            telegram,
            store.clone(),
            TokioTimeProvider,
            RetryPolicy::default(),
        );
        tracing::info!(
            push = dispatcher.push_enabled(),
            telegram = dispatcher.telegram_enabled(),
            "notification channels configured"
        );

        Ok(Self {
            config,
            auth,
            store,
            catalog,
            dispatcher,
            push_public_key,
            monitor: SharedStatus::default(),
        })
    }
}
