use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::i18n::Language;
use crate::types::push::Subscription;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub notifications: Vec<NotificationPreferences>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl User {
    /// The place the proximity flow reads; later entries are ignored.
    pub fn place(&self) -> Option<&Place> {
        self.places.first()
    }

    pub fn preferences(&self) -> NotificationPreferences {
        self.notifications.first().cloned().unwrap_or_default()
    }

    pub fn home(&self) -> Option<Coordinate> {
        self.place().and_then(Place::coordinate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub region: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Place {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default)]
    pub push_enabled: bool,
    #[serde(default)]
    pub telegram_enabled: bool,
    pub telegram_id: Option<i64>,
    pub telegram_username: Option<String>,
}

impl NotificationPreferences {
    /// Telegram delivery needs both the flag and a numeric chat id.
    pub fn telegram_chat(&self) -> Option<i64> {
        if self.telegram_enabled {
            self.telegram_id
        } else {
            None
        }
    }
}

/// Public view of a user, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub language: Language,
    pub place: Option<Place>,
    pub notifications: NotificationPreferences,
    pub push_subscriptions: usize,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            language: user.language,
            place: user.place().cloned(),
            notifications: user.preferences(),
            push_subscriptions: user.subscriptions.len(),
        }
    }
}
