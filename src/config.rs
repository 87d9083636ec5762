use crate::adapters::DEFAULT_TELEGRAM_API_BASE;
use crate::feed::FeedConfig;

use std::path::PathBuf;

pub const APP_NAME: &str = "SafeQuake";

#[derive(Clone)]
pub struct AppConfig {
    pub app_name: String,
    /// Directory holding `store.json` and `state.json`; in-memory when unset.
    pub data_dir: Option<PathBuf>,
    pub feed: FeedConfig,
    pub monitor_enabled: bool,
    pub alert_radius_km: f64,
    pub record_radius_km: f64,
    pub telegram: Option<TelegramConfig>,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub auth: AuthConfig,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; the webhook rejects every
    /// update when unset.
    pub webhook_secret: Option<String>,
}

impl TelegramConfig {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            webhook_secret: None,
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
}

impl AppConfig {
    pub fn store_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("store.json"))
    }

    pub fn state_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("state.json"))
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            data_dir: None,
            feed: FeedConfig::default(),
            monitor_enabled: false,
            alert_radius_km: crate::monitor::DEFAULT_ALERT_RADIUS_KM,
            record_radius_km: crate::recorder::DEFAULT_RECORD_RADIUS_KM,
            telegram: None,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            auth: AuthConfig {
                key: "c2FmZXF1YWtlLXRlc3Qta2V5".to_string(),
                token_ttl: time::Duration::days(14),
            },
        }
    }
}
