use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use crate::records::repo::RecordStore;
use crate::state::AppState;

use super::dto::RecordListItem;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/records", get(list_records))
}

#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecordListItem>>, (StatusCode, String)> {
    let records = state.records.list().await.map_err(|e| {
        error!(error = %e, "list feeding records failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(records.into_iter().map(RecordListItem::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_is_newest_first_and_idempotent() {
        let state = AppState::fake();
        state.records.insert(Some("first"), None).await.unwrap();
        state
            .records
            .insert(Some("second"), Some("https://fake.local/cat-photos/k.jpg"))
            .await
            .unwrap();

        let Json(items) = list_records(State(state.clone())).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].notes.as_deref(), Some("second"));
        assert_eq!(items[1].notes.as_deref(), Some("first"));

        let Json(again) = list_records(State(state)).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        let ids_again: Vec<_> = again.iter().map(|i| i.id).collect();
        assert_eq!(ids, ids_again);
    }
}
