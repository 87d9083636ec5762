use crate::adapters::WebPushSender;
use crate::config;

mod vapid;

pub use vapid::{VapidCredentials, generate_vapid_credentials};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};

/// The web push transport, when VAPID credentials are complete and usable.
pub(crate) fn build_push_sender(config: &config::AppConfig) -> Option<WebPushSender> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            tracing::warn!("push notifications disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => {
            tracing::info!("push notifications disabled: no VAPID configuration");
            return None;
        }
    };

    match WebPushSender::new(vapid) {
        Ok(sender) => Some(sender),
        Err(err) => {
            tracing::error!(error = %err, "push notifications disabled: failed to init web-push");
            None
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn build_push_sender__should_be_none_without_vapid() {
        assert!(build_push_sender(&config::AppConfig::default()).is_none());
    }

    #[test]
    fn build_push_sender__should_expose_public_key_when_configured() {
        // Given
        let credentials = generate_vapid_credentials().expect("credentials");
        let config = config::AppConfig {
            vapid_private_key: Some(credentials.private_key),
            vapid_public_key: Some(credentials.public_key.clone()),
            vapid_subject: Some("mailto:ops@example.com".to_string()),
            ..Default::default()
        };

        // When
        let sender = build_push_sender(&config).expect("sender");

        // Then
        assert_eq!(sender.public_key(), credentials.public_key);
    }
}
