use crate::i18n::{Labels, Language};
use crate::types::advice::Advice;
use crate::types::event::SeismicEvent;

use askama::Template;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

#[derive(Template)]
#[template(path = "alert.txt", escape = "none")]
pub(crate) struct AlertMessage<'a> {
    pub(crate) labels: &'a Labels,
    pub(crate) magnitude: String,
    pub(crate) mag_type: &'a str,
    pub(crate) place: &'a str,
    pub(crate) time: String,
    pub(crate) depth: String,
    pub(crate) distance: Option<String>,
}

impl<'a> AlertMessage<'a> {
    pub(crate) fn new(event: &'a SeismicEvent, distance: Option<f64>, language: Language) -> Self {
        Self {
            labels: language.labels(),
            magnitude: format!("{:.1}", event.magnitude),
            mag_type: &event.mag_type,
            place: &event.place,
            time: display_time(event.time),
            depth: format!("{:.1}", event.geometry.depth),
            distance: distance.map(|km| format!("{km:.2}")),
        }
    }
}

#[derive(Template)]
#[template(path = "advice.txt", escape = "none")]
pub(crate) struct AdviceMessage<'a> {
    pub(crate) labels: &'a Labels,
    pub(crate) band: String,
    pub(crate) advice: &'a Advice,
}

impl<'a> AdviceMessage<'a> {
    pub(crate) fn new(advice: &'a Advice, language: Language) -> Self {
        Self {
            labels: language.labels(),
            band: advice.band.to_string(),
            advice,
        }
    }
}

/// Short one-line title used by push notifications and the in-app list.
pub(crate) fn alert_title(event: &SeismicEvent, language: Language) -> String {
    format!(
        "{} M{:.1} - {}",
        language.labels().alert_title,
        event.magnitude,
        event.place
    )
}

const DISPLAY_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

pub(crate) fn display_time(time: OffsetDateTime) -> String {
    time.to_offset(time::UtcOffset::UTC)
        .format(DISPLAY_TIME)
        .unwrap_or_default()
}
