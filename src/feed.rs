//! External seismic feed: query parameters and GeoJSON response parsing.
//!
//! The feed speaks the FDSN event web-service dialect. Responses are GeoJSON
//! feature collections; every feature is validated into a [`SeismicEvent`]
//! before anything else sees it.

use crate::types::event::{Epicenter, SeismicEvent};

use serde::Deserialize;
use std::time::Duration;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

pub const DEFAULT_FEED_URL: &str = "https://webservices.ingv.it/fdsnws/event/1/query";
pub const DEFAULT_MIN_MAGNITUDE: f64 = 2.0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Italian territory and surrounding seas.
    pub const ITALY: BoundingBox = BoundingBox {
        min_latitude: 35.0,
        max_latitude: 48.0,
        min_longitude: 6.0,
        max_longitude: 19.0,
    };

    /// Parses `minlat,maxlat,minlon,maxlon`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let values = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("invalid bounding box '{raw}'; expected minlat,maxlat,minlon,maxlon"))?;
        let [min_latitude, max_latitude, min_longitude, max_longitude] = values[..] else {
            return Err(format!(
                "invalid bounding box '{raw}'; expected 4 values, got {}",
                values.len()
            ));
        };
        if !(-90.0..=90.0).contains(&min_latitude)
            || !(-90.0..=90.0).contains(&max_latitude)
            || min_latitude >= max_latitude
        {
            return Err(format!("invalid latitude range in bounding box '{raw}'"));
        }
        if !(-180.0..=180.0).contains(&min_longitude)
            || !(-180.0..=180.0).contains(&max_longitude)
            || min_longitude >= max_longitude
        {
            return Err(format!("invalid longitude range in bounding box '{raw}'"));
        }
        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub bounding_box: BoundingBox,
    pub min_magnitude: f64,
    pub poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            bounding_box: BoundingBox::ITALY,
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub min_magnitude: f64,
    pub bounding_box: BoundingBox,
}

impl FeedQuery {
    /// Everything from 1 January of the current UTC year up to `now`.
    pub fn for_current_year(now: OffsetDateTime, config: &FeedConfig) -> Self {
        let now = now.to_offset(time::UtcOffset::UTC);
        let start = Date::from_calendar_date(now.year(), Month::January, 1)
            .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
            .unwrap_or(now);
        Self {
            start,
            end: now,
            min_magnitude: config.min_magnitude,
            bounding_box: config.bounding_box,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let bbox = &self.bounding_box;
        vec![
            ("starttime", query_time(self.start)),
            ("endtime", query_time(self.end)),
            ("minmagnitude", self.min_magnitude.to_string()),
            ("minlatitude", bbox.min_latitude.to_string()),
            ("maxlatitude", bbox.max_latitude.to_string()),
            ("minlongitude", bbox.min_longitude.to_string()),
            ("maxlongitude", bbox.max_longitude.to_string()),
            ("orderby", "time".to_string()),
            ("format", "geojson".to_string()),
        ]
    }
}

const QUERY_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

fn query_time(time: OffsetDateTime) -> String {
    time.to_offset(time::UtcOffset::UTC)
        .format(QUERY_TIME)
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned HTTP {0}")]
    HttpStatus(u16),
    #[error("malformed feed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: Option<FeedId>,
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(rename = "eventId")]
    event_id: Option<FeedId>,
    time: Option<FeedTime>,
    mag: Option<f64>,
    #[serde(rename = "magType")]
    mag_type: Option<String>,
    place: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedId {
    Number(i64),
    Text(String),
}

impl FeedId {
    fn into_string(self) -> String {
        match self {
            FeedId::Number(id) => id.to_string(),
            FeedId::Text(id) => id.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedTime {
    Millis(i64),
    Text(String),
}

impl FeedTime {
    fn parse(&self) -> Option<OffsetDateTime> {
        match self {
            FeedTime::Millis(ms) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(*ms) * 1_000_000).ok()
            }
            FeedTime::Text(raw) => {
                let raw = raw.trim();
                OffsetDateTime::parse(raw, &Rfc3339)
                    .or_else(|_| OffsetDateTime::parse(&format!("{raw}Z"), &Rfc3339))
                    .ok()
            }
        }
    }
}

impl TryFrom<Feature> for SeismicEvent {
    type Error = String;

    fn try_from(feature: Feature) -> Result<Self, Self::Error> {
        let Feature {
            id,
            properties,
            geometry,
        } = feature;

        let event_id = properties
            .event_id
            .or(id)
            .map(FeedId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or("missing event id")?;
        let time = properties
            .time
            .as_ref()
            .and_then(FeedTime::parse)
            .ok_or_else(|| format!("event {event_id}: missing or invalid time"))?;
        let magnitude = properties
            .mag
            .filter(|mag| mag.is_finite())
            .ok_or_else(|| format!("event {event_id}: missing magnitude"))?;

        let coordinates = geometry.map(|geometry| geometry.coordinates).unwrap_or_default();
        let [longitude, latitude, depth] = coordinates[..] else {
            return Err(format!(
                "event {event_id}: expected [lon, lat, depth], got {} values",
                coordinates.len()
            ));
        };
        if !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
            || !depth.is_finite()
        {
            return Err(format!("event {event_id}: coordinates out of range"));
        }

        Ok(SeismicEvent {
            event_id,
            time,
            magnitude,
            mag_type: properties.mag_type.unwrap_or_default(),
            geometry: Epicenter {
                latitude,
                longitude,
                depth,
            },
            place: properties.place.unwrap_or_default(),
            author: properties.author,
        })
    }
}

/// Parses a GeoJSON response body. Invalid features are skipped with a warning;
/// a body that is not a feature collection is rejected as a whole.
pub fn parse_events(body: &str) -> Result<Vec<SeismicEvent>, FeedError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|err| FeedError::Malformed(err.to_string()))?;

    let mut events = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        match SeismicEvent::try_from(feature) {
            Ok(event) => events.push(event),
            Err(reason) => tracing::warn!(%reason, "skipping malformed feed feature"),
        }
    }
    Ok(events)
}

/// The most recent event by occurrence time.
pub fn latest_event(events: Vec<SeismicEvent>) -> Option<SeismicEvent> {
    events.into_iter().max_by_key(|event| event.time)
}
