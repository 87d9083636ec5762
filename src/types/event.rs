use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::geo::Coordinate;

/// Epicenter of an event as reported by the feed. Depth is in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Epicenter {
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
}

impl Epicenter {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// An event as delivered by the external feed, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeismicEvent {
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub magnitude: f64,
    pub mag_type: String,
    pub geometry: Epicenter,
    pub place: String,
    pub author: Option<String>,
}

/// A nearby event stored for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeismicEventRecord {
    pub id: u64,
    pub user: u64,
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub mag_type: String,
    pub magnitude: f64,
    pub geometry: Epicenter,
    pub place: String,
    pub proximity: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields of a record before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeismicEventRecord {
    pub user: u64,
    pub event_id: String,
    pub time: OffsetDateTime,
    pub mag_type: String,
    pub magnitude: f64,
    pub geometry: Epicenter,
    pub place: String,
    pub proximity: f64,
}

impl NewSeismicEventRecord {
    pub fn from_event(user: u64, event: &SeismicEvent, proximity: f64) -> Self {
        Self {
            user,
            event_id: event.event_id.clone(),
            time: event.time,
            mag_type: event.mag_type.clone(),
            magnitude: event.magnitude,
            geometry: event.geometry,
            place: event.place.clone(),
            proximity,
        }
    }
}
