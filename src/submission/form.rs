//! Transient form state for one submission surface: the entered note, the
//! selected picture, the pipeline status, and the last error split into a
//! conversion slot (shown next to the file input) and a submission slot
//! (shown at the form header). Entered data survives a failure so the
//! user can retry without re-typing; everything resets only on success.

use super::normalize::RawUpload;
use super::pipeline::SubmissionRequest;
use super::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormStatus {
    #[default]
    Idle,
    Pending,
    Failed,
}

#[derive(Debug, Default)]
pub struct FormController {
    notes: String,
    picture: Option<RawUpload>,
    status: FormStatus,
    conversion_error: Option<String>,
    submit_error: Option<String>,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn attach(&mut self, picture: RawUpload) {
        self.picture = Some(picture);
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn picture(&self) -> Option<&RawUpload> {
        self.picture.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == FormStatus::Pending
    }

    pub fn conversion_error(&self) -> Option<&str> {
        self.conversion_error.as_deref()
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Start a submission attempt. Refuses while one is already pending:
    /// at most one in-flight submission per form instance.
    pub fn begin(&mut self) -> Option<SubmissionRequest> {
        if self.status == FormStatus::Pending {
            return None;
        }
        self.status = FormStatus::Pending;
        self.conversion_error = None;
        self.submit_error = None;
        Some(SubmissionRequest {
            notes: Some(self.notes.clone()).filter(|n| !n.trim().is_empty()),
            picture: self.picture.clone(),
        })
    }

    /// Record a terminal pipeline error. Keeps the entered notes and
    /// picture for retry.
    pub fn fail(&mut self, err: &SubmitError) {
        self.status = FormStatus::Failed;
        if err.is_conversion() {
            self.conversion_error = Some(err.to_string());
        } else {
            self.submit_error = Some(err.to_string());
        }
    }

    /// Reset after a successful submission.
    pub fn complete(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn picture() -> RawUpload {
        RawUpload {
            filename: "cat.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(&[1, 2, 3]),
        }
    }

    #[test]
    fn only_one_submission_can_be_in_flight() {
        let mut form = FormController::new();
        form.set_notes("fed at 9am");

        assert!(form.begin().is_some());
        assert!(form.is_pending());
        assert!(form.begin().is_none());
    }

    #[test]
    fn failure_keeps_entered_data_and_routes_the_error() {
        let mut form = FormController::new();
        form.set_notes("fed at 9am");
        form.attach(picture());
        form.begin().unwrap();

        form.fail(&SubmitError::ConversionFailed("bad file".into()));
        assert_eq!(form.notes(), "fed at 9am");
        assert!(form.picture().is_some());
        assert!(form.conversion_error().unwrap().contains("bad file"));
        assert!(form.submit_error().is_none());

        // A retry is startable and clears the stale error.
        let retry = form.begin().unwrap();
        assert_eq!(retry.notes.as_deref(), Some("fed at 9am"));
        assert!(form.conversion_error().is_none());

        form.fail(&SubmitError::UploadFailed("storage down".into()));
        assert!(form.submit_error().unwrap().contains("storage down"));
        assert!(form.conversion_error().is_none());
    }

    #[test]
    fn success_resets_everything() {
        let mut form = FormController::new();
        form.set_notes("fed at 9am");
        form.attach(picture());
        form.begin().unwrap();

        form.complete();
        assert_eq!(form.notes(), "");
        assert!(form.picture().is_none());
        assert!(!form.is_pending());
    }

    #[test]
    fn whitespace_notes_are_not_part_of_the_request() {
        let mut form = FormController::new();
        form.set_notes("   ");
        let req = form.begin().unwrap();
        assert!(req.notes.is_none());
        assert!(req.picture.is_none());
    }
}
