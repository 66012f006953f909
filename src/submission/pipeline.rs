//! One record-creation attempt, driven as an explicit state machine:
//! `Idle → Validating → Normalizing → Uploading → Persisting → Done | Failed`.
//!
//! Steps are strictly sequential; persistence needs the upload's public
//! reference, so no two network calls overlap within one submission.
//! There is no retry and no compensation: a failed insert leaves the
//! uploaded object orphaned in storage.

use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::records::repo::{FeedingRecord, RecordStore};
use crate::storage::StorageClient;

use super::normalize::{normalize, RawUpload};
use super::SubmitError;

/// Typed submission input, validated before the pipeline touches the
/// network. Built at the HTTP boundary from the multipart form.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub notes: Option<String>,
    pub picture: Option<RawUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Normalizing,
    Uploading,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Begin,
    Accepted,
    Normalized,
    Uploaded,
    Persisted,
    Rejected,
}

/// Pure transition function over pipeline phases. Any step that is not
/// legal for the current phase lands in `Failed`.
pub fn advance(phase: Phase, step: Step) -> Phase {
    use Phase::*;
    use Step::*;
    match (phase, step) {
        (Idle, Begin) => Validating,
        (Validating, Accepted) => Normalizing,
        (Normalizing, Normalized) => Uploading,
        (Uploading, Uploaded) => Persisting,
        (Persisting, Persisted) => Done,
        (_, Rejected) => Failed,
        _ => Failed,
    }
}

struct Pipeline {
    phase: Phase,
}

impl Pipeline {
    fn step(&mut self, step: Step) {
        self.phase = advance(self.phase, step);
        debug!(phase = ?self.phase, "submission phase");
    }

    fn reject<T>(&mut self, err: SubmitError) -> Result<T, SubmitError> {
        self.step(Step::Rejected);
        Err(err)
    }
}

/// Run one submission attempt end to end against the injected
/// collaborators. Returns the created record, or the first terminal error.
#[instrument(skip_all, fields(has_picture = req.picture.is_some()))]
pub async fn submit(
    storage: &dyn StorageClient,
    records: &dyn RecordStore,
    req: SubmissionRequest,
) -> Result<FeedingRecord, SubmitError> {
    let mut pipeline = Pipeline { phase: Phase::Idle };
    pipeline.step(Step::Begin);

    let notes = req
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if notes.is_none() && req.picture.is_none() {
        return pipeline.reject(SubmitError::ValidationFailed);
    }
    pipeline.step(Step::Accepted);

    let picture = match req.picture {
        Some(raw) => match normalize(raw) {
            Ok(p) => Some(p),
            Err(e) => return pipeline.reject(e),
        },
        None => None,
    };
    pipeline.step(Step::Normalized);

    let image_url = match &picture {
        Some(p) => {
            let key = object_key(&p.filename);
            if let Err(e) = storage.put_object(&key, p.bytes.clone(), &p.content_type).await {
                return pipeline.reject(SubmitError::UploadFailed(e.to_string()));
            }
            Some(storage.public_url(&key))
        }
        None => None,
    };
    pipeline.step(Step::Uploaded);

    let record = match records.insert(notes, image_url.as_deref()).await {
        Ok(r) => r,
        Err(e) => return pipeline.reject(SubmitError::PersistFailed(e.to_string())),
    };
    pipeline.step(Step::Persisted);

    info!(record_id = %record.id, "feeding record created");
    Ok(record)
}

/// Collision-free object key: millisecond prefix for chronology, a UUID
/// for uniqueness across concurrent submissions, the sanitized original
/// name for traceability.
fn object_key(filename: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{}-{}-{}", millis, Uuid::new_v4().simple(), sanitize(filename))
}

fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
