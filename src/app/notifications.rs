use crate::app::auth::CurrentUser;
use crate::app::{ApiError, StatusResponse, store_error};
use crate::state;
use crate::types::inbox::InAppNotification;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};

pub(crate) async fn notification_list(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Json<Vec<InAppNotification>> {
    Json(state.store.inbox(current.0))
}

pub(crate) async fn notification_delete(
    State(state): State<state::AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .store
        .delete_inbox(current.0, id)
        .map_err(store_error)?;
    Ok(Json(StatusResponse { status: "deleted" }))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::app::tests::{send, signed_up, test_state};
    use crate::types::inbox::InAppKind;
    use axum::http::StatusCode;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn notification_list__should_return_own_entries_newest_first() {
        // Given
        let state = test_state();
        let (id, token) = signed_up(&state, "inbox@example.com").await;
        let (other, _) = signed_up(&state, "someone@example.com").await;
        for (user, event_id, at) in [(id, "1", 10), (other, "2", 20), (id, "3", 30)] {
            state
                .store
                .push_inbox(
                    user,
                    InAppKind::Alert,
                    event_id,
                    "title".to_string(),
                    "body".to_string(),
                    OffsetDateTime::from_unix_timestamp(at).expect("time"),
                )
                .expect("push inbox");
        }

        // When
        let (status, body) = send(&state, "GET", "/api/notifications", Some(&token), None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let events: Vec<&str> = body
            .as_array()
            .expect("entries")
            .iter()
            .map(|entry| entry["eventId"].as_str().expect("event id"))
            .collect();
        assert_eq!(events, vec!["3", "1"]);
        assert_eq!(body[0]["kind"], "alert");
    }

    #[tokio::test]
    async fn notification_delete__should_dismiss_own_entry() {
        // Given
        let state = test_state();
        let (id, token) = signed_up(&state, "dismiss@example.com").await;
        let (_, other) = signed_up(&state, "stranger@example.com").await;
        let entry = state
            .store
            .push_inbox(
                id,
                InAppKind::Alert,
                "1",
                "title".to_string(),
                "body".to_string(),
                OffsetDateTime::UNIX_EPOCH,
            )
            .expect("push inbox");
        let uri = format!("/api/notifications/{}", entry.id);

        // When
        let (foreign, _) = send(&state, "DELETE", &uri, Some(&other), None).await;
        let (own, _) = send(&state, "DELETE", &uri, Some(&token), None).await;

        // Then
        assert_eq!(foreign, StatusCode::NOT_FOUND);
        assert_eq!(own, StatusCode::OK);
        assert!(state.store.inbox(id).is_empty());
    }
}
