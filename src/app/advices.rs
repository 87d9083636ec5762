use crate::app::{ApiError, api_error};
use crate::state;
use crate::types::advice::Advice;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

pub(crate) async fn advice_list(State(state): State<state::AppState>) -> Json<Vec<Advice>> {
    Json(state.catalog.entries().to_vec())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupQuery {
    magnitude: f64,
}

pub(crate) async fn advice_lookup(
    State(state): State<state::AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Advice>, ApiError> {
    state
        .catalog
        .select(query.magnitude)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("no advice for magnitude {}", query.magnitude),
            )
        })
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::app::tests::{send, test_state};

    #[tokio::test]
    async fn advice_list__should_return_all_bands() {
        let state = test_state();

        let (status, body) = send(&state, "GET", "/api/advices", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(9));
    }

    #[tokio::test]
    async fn advice_lookup__should_use_half_open_bands() {
        // Given
        let state = test_state();

        // When
        let (status, body) =
            send(&state, "GET", "/api/advices/lookup?magnitude=5.4", None, None).await;
        let (missing, _) =
            send(&state, "GET", "/api/advices/lookup?magnitude=1.5", None, None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["band"]["min"], 5.4);
        assert_eq!(missing, StatusCode::NOT_FOUND);
    }
}
