use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::config;
use crate::types::push::VapidConfig;

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

impl VapidCredentials {
    /// Environment assignments ready to paste into a service definition.
    pub fn env_lines(&self, subject: &str) -> [String; 3] {
        [
            format!("SAFEQUAKE_VAPID_PRIVATE_KEY=\"{}\"", self.private_key),
            format!("SAFEQUAKE_VAPID_PUBLIC_KEY=\"{}\"", self.public_key),
            format!("SAFEQUAKE_VAPID_SUBJECT=\"{subject}\""),
        ]
    }
}

#[derive(Debug, Clone)]
pub(crate) enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

pub(crate) fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let private_key = non_blank(&config.vapid_private_key);
    let public_key = non_blank(&config.vapid_public_key);
    let subject = non_blank(&config.vapid_subject);

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key,
                public_key,
                subject,
            })
        }
        (None, None, None) => VapidConfigStatus::Missing,
        _ => VapidConfigStatus::Incomplete,
    }
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let mut key_bytes = [0u8; 32];
    let key_pair = loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            break key_pair;
        }
    };
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();

    Ok(VapidCredentials {
        private_key,
        public_key: encode_config(public_key, URL_SAFE_NO_PAD),
    })
}
