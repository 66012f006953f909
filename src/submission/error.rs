use thiserror::Error;

/// Everything that can terminally fail a submission attempt. Compression
/// failure is deliberately absent: it degrades to the uncompressed payload
/// and the pipeline continues.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Add a note or attach a photo before submitting.")]
    ValidationFailed,
    #[error("Could not convert the photo: {0}. Try a different file.")]
    ConversionFailed(String),
    #[error("Photo upload failed: {0}")]
    UploadFailed(String),
    #[error("Saving the record failed: {0}")]
    PersistFailed(String),
}

impl SubmitError {
    /// Conversion problems render next to the file input; everything else
    /// at the form header.
    pub fn is_conversion(&self) -> bool {
        matches!(self, SubmitError::ConversionFailed(_))
    }
}
