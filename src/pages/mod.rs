pub mod render;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use maud::Markup;
use tracing::{error, instrument, warn};

use crate::records::repo::{FeedingRecord, RecordStore};
use crate::state::AppState;
use crate::submission::form::FormController;
use crate::submission::{pipeline, RawUpload, SubmitError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/records", post(create_record))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // phone photos
}

#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Markup {
    let (records, load_error) = load_gallery(&state).await;
    render::page(&FormController::new(), &records, load_error)
}

/// POST /records (multipart: notes, picture). Redirects to `/` on success
/// so the form resets and the gallery re-queries; re-renders the page with
/// the preserved note and the error message on failure.
#[instrument(skip(state, mp))]
pub async fn create_record(State(state): State<AppState>, mut mp: Multipart) -> Response {
    let mut form = FormController::new();

    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("notes") => {
                if let Ok(text) = field.text().await {
                    form.set_notes(text);
                }
            }
            Some("picture") => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let Ok(bytes) = field.bytes().await else {
                    continue;
                };
                // Browsers send an empty part when no file was chosen.
                match filename {
                    Some(filename) if !filename.is_empty() && !bytes.is_empty() => {
                        form.attach(RawUpload {
                            filename,
                            content_type,
                            bytes,
                        });
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // A fresh controller is never pending, so this cannot refuse here;
    // the branch exists for long-lived form instances (and the tests).
    let Some(request) = form.begin() else {
        return (
            StatusCode::CONFLICT,
            "A submission is already in progress.".to_string(),
        )
            .into_response();
    };

    match pipeline::submit(state.storage.as_ref(), state.records.as_ref(), request).await {
        Ok(_) => {
            form.complete();
            Redirect::to("/").into_response()
        }
        Err(err) => {
            warn!(error = %err, "submission failed");
            form.fail(&err);
            let (records, load_error) = load_gallery(&state).await;
            let status = match err {
                SubmitError::ValidationFailed | SubmitError::ConversionFailed(_) => {
                    StatusCode::BAD_REQUEST
                }
                SubmitError::UploadFailed(_) | SubmitError::PersistFailed(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, render::page(&form, &records, load_error)).into_response()
        }
    }
}

/// Listing failures never break the page: render an error banner and an
/// empty gallery instead.
async fn load_gallery(state: &AppState) -> (Vec<FeedingRecord>, Option<&'static str>) {
    match state.records.list().await {
        Ok(records) => (records, None),
        Err(e) => {
            error!(error = %e, "loading the gallery failed");
            (Vec::new(), Some("Could not load earlier records."))
        }
    }
}
