use crate::ports::state::StateStore;
use crate::types::event::SeismicEvent;

use serde::{Deserialize, Serialize};

pub const LAST_NOTIFIED_KEY: &str = "lastNotifiedEvent";

/// Identity of an event for deduplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(String);

impl EventKey {
    /// The feed identifier, or `time|place|magnitude` when the feed gave none.
    pub fn of(event: &SeismicEvent) -> Self {
        let id = event.event_id.trim();
        if !id.is_empty() {
            return Self(id.to_string());
        }
        Self(format!(
            "{}|{}|{}",
            event.time.unix_timestamp_nanos(),
            event.place,
            event.magnitude
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Marker {
    event_id: EventKey,
    event: SeismicEvent,
}

/// Lets each distinct event through once.
#[derive(Debug, Clone)]
pub struct DeduplicationGate<S> {
    store: S,
}

impl<S: StateStore> DeduplicationGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns `true` when `event` differs from the last notified one.
    ///
    /// The marker is updated before returning `true`, so a dispatch that fails
    /// afterwards is not retried on the next poll.
    pub fn admit(&self, event: &SeismicEvent) -> Result<bool, S::Error> {
        let key = EventKey::of(event);
        if let Some(marker) = self.marker()?
            && marker.event_id == key
        {
            return Ok(false);
        }

        let marker = Marker {
            event_id: key,
            event: event.clone(),
        };
        let value = serde_json::to_value(&marker).unwrap_or(serde_json::Value::Null);
        self.store.set(LAST_NOTIFIED_KEY, value)?;
        Ok(true)
    }

    pub fn last_notified(&self) -> Result<Option<SeismicEvent>, S::Error> {
        Ok(self.marker()?.map(|marker| marker.event))
    }

    pub fn reset(&self) -> Result<(), S::Error> {
        self.store.clear(LAST_NOTIFIED_KEY)
    }

    fn marker(&self) -> Result<Option<Marker>, S::Error> {
        let Some(value) = self.store.get(LAST_NOTIFIED_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(marker) => Ok(Some(marker)),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable last-notified marker");
                Ok(None)
            }
        }
    }
}
