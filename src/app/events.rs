use crate::app::auth::CurrentUser;
use crate::app::{ApiError, StatusResponse, api_error, store_error};
use crate::poller::MonitorStatus;
use crate::recorder::{RecordOutcome, SeismicEventRecorder};
use crate::state;
use crate::store::{Page, Pagination, SortDirection, SortKey};
use crate::types::event::{Epicenter, SeismicEvent, SeismicEventRecord};

use axum::Extension;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;

const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    page: Option<usize>,
    limit: Option<usize>,
    sort: Option<SortKey>,
    sort_direction: Option<SortDirection>,
}

impl ListQuery {
    fn pagination(&self) -> Result<Pagination, ApiError> {
        let defaults = Pagination::default();
        let page = self.page.unwrap_or(defaults.page);
        let limit = self.limit.unwrap_or(defaults.limit);
        if page == 0 {
            return Err(api_error(StatusCode::BAD_REQUEST, "page starts at 1"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        Ok(Pagination {
            page,
            limit,
            sort: self.sort.unwrap_or_default(),
            direction: self.sort_direction.unwrap_or_default(),
        })
    }
}

pub(crate) async fn event_list(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<SeismicEventRecord>>, ApiError> {
    let pagination = query.pagination()?;
    Ok(Json(state.store.records_for_user(current.0, pagination)))
}

/// Body of a client-side record request; the owner always comes from the token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRecordRequest {
    event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    time: OffsetDateTime,
    mag_type: String,
    magnitude: f64,
    geometry: Epicenter,
    place: String,
    proximity: f64,
}

pub(crate) async fn event_create(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<SeismicEventRecord>), ApiError> {
    if request.event_id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "eventId is required"));
    }
    if !request.magnitude.is_finite() || !request.proximity.is_finite() || request.proximity < 0.0
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "magnitude and proximity must be finite numbers",
        ));
    }

    let event = SeismicEvent {
        event_id: request.event_id.trim().to_string(),
        time: request.time,
        magnitude: request.magnitude,
        mag_type: request.mag_type,
        geometry: request.geometry,
        place: request.place,
        author: None,
    };
    let recorder = SeismicEventRecorder::new(state.store.clone(), state.config.record_radius_km);
    let outcome = recorder
        .record(current.0, &event, request.proximity, OffsetDateTime::now_utc())
        .map_err(store_error)?;

    match outcome {
        RecordOutcome::Recorded(record) => Ok((StatusCode::CREATED, Json(record))),
        RecordOutcome::AlreadyRecorded => Err(api_error(
            StatusCode::CONFLICT,
            "event is already recorded",
        )),
        RecordOutcome::OutOfRange => Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "event is outside the recording radius",
        )),
    }
}

pub(crate) async fn event_delete(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .store
        .delete_record(current.0, id)
        .map_err(store_error)?;
    Ok(Json(StatusResponse { status: "deleted" }))
}

pub(crate) async fn event_latest(State(state): State<state::AppState>) -> Json<MonitorStatus> {
    let status = state.monitor.lock().expect("monitor status lock").clone();
    Json(status)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::app::tests::{send, signed_up, test_state};
    use serde_json::{Value, json};

    fn record_body(event_id: &str, magnitude: f64, proximity: f64) -> Value {
        json!({
            "eventId": event_id,
            "time": "2026-03-05T12:34:56Z",
            "magType": "ML",
            "magnitude": magnitude,
            "geometry": { "latitude": 41.0, "longitude": 14.0, "depth": 10.0 },
            "place": "Caserta",
            "proximity": proximity,
            "user": 999,
        })
    }

    #[tokio::test]
    async fn event_create__should_record_once_per_user() {
        // Given
        let state = test_state();
        let (id, token) = signed_up(&state, "records@example.com").await;

        // When
        let (created, body) = send(
            &state,
            "POST",
            "/api/seismicEvents",
            Some(&token),
            Some(record_body("38000001", 4.5, 6.96)),
        )
        .await;
        let (duplicate, _) = send(
            &state,
            "POST",
            "/api/seismicEvents",
            Some(&token),
            Some(record_body("38000001", 4.5, 6.96)),
        )
        .await;

        // Then
        assert_eq!(created, StatusCode::CREATED);
        assert_eq!(body["user"], id);
        assert_eq!(body["proximity"], 6.96);
        assert_eq!(duplicate, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn event_create__should_reject_far_events() {
        let state = test_state();
        let (_, token) = signed_up(&state, "far@example.com").await;

        let (status, _) = send(
            &state,
            "POST",
            "/api/seismicEvents",
            Some(&token),
            Some(record_body("1", 3.0, 250.0)),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn event_list__should_sort_and_paginate() {
        // Given
        let state = test_state();
        let (_, token) = signed_up(&state, "list@example.com").await;
        for (id, magnitude) in [("a", 2.5), ("b", 4.1), ("c", 3.3)] {
            let (status, _) = send(
                &state,
                "POST",
                "/api/seismicEvents",
                Some(&token),
                Some(record_body(id, magnitude, 10.0)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        // When
        let (status, body) = send(
            &state,
            "GET",
            "/api/seismicEvents?page=1&limit=2&sort=magnitude&sortDirection=desc",
            Some(&token),
            None,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        let ids: Vec<&str> = body["items"]
            .as_array()
            .expect("items")
            .iter()
            .map(|item| item["eventId"].as_str().expect("event id"))
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn event_list__should_reject_limit_out_of_range() {
        let state = test_state();
        let (_, token) = signed_up(&state, "limit@example.com").await;

        let (status, _) = send(
            &state,
            "GET",
            "/api/seismicEvents?limit=101",
            Some(&token),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn event_delete__should_remove_only_own_records() {
        // Given
        let state = test_state();
        let (_, owner) = signed_up(&state, "owner@example.com").await;
        let (_, other) = signed_up(&state, "other@example.com").await;
        let (_, body) = send(
            &state,
            "POST",
            "/api/seismicEvents",
            Some(&owner),
            Some(record_body("38000001", 4.5, 6.96)),
        )
        .await;
        let uri = format!("/api/seismicEvents/{}", body["id"]);

        // When
        let (foreign, _) = send(&state, "DELETE", &uri, Some(&other), None).await;
        let (own, _) = send(&state, "DELETE", &uri, Some(&owner), None).await;

        // Then
        assert_eq!(foreign, StatusCode::NOT_FOUND);
        assert_eq!(own, StatusCode::OK);
    }

    #[tokio::test]
    async fn event_latest__should_return_monitor_status() {
        let state = test_state();
        let (_, token) = signed_up(&state, "latest@example.com").await;

        let (status, body) =
            send(&state, "GET", "/api/seismicEvents/latest", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latestEvent"], Value::Null);
        assert_eq!(body["lastPollAt"], Value::Null);
    }
}
