//! Error taxonomy for the workflow controller and the service client.

use shared::domain::{FilterId, FilterParameter};
use thiserror::Error;

use crate::preview::format_file_size;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "Please select a valid image file. File type: {mime_type}, Extension: {extension}"
    )]
    UnsupportedType { mime_type: String, extension: String },
    #[error(
        "File size too large ({}). Maximum size is {}",
        format_file_size(*size_bytes),
        format_file_size(*max_bytes)
    )]
    TooLarge { size_bytes: u64, max_bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Please select an image and filter first")]
    MissingSelection,
    #[error("Please select an image first")]
    NoImage,
    #[error("No processed image to download")]
    NoResult,
    #[error("{parameter} does not apply to the selected filter ({})", filter.map(FilterId::as_str).unwrap_or("none"))]
    ParameterNotApplicable {
        parameter: FilterParameter,
        filter: Option<FilterId>,
    },
}

/// Failure reported by an [`crate::ImageService`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceFailure {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
}

impl ServiceFailure {
    pub fn message(&self) -> &str {
        match self {
            ServiceFailure::Transport(message) => message,
            ServiceFailure::Status { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for ServiceFailure {
    fn from(err: reqwest::Error) -> Self {
        ServiceFailure::Transport(err.to_string())
    }
}

/// Inline error slot a failure is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRegion {
    Upload,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Service { status: u16, message: String },
    #[error("a processing request is already in flight")]
    SubmissionInFlight,
}

impl From<ServiceFailure> for WorkflowError {
    fn from(failure: ServiceFailure) -> Self {
        match failure {
            ServiceFailure::Transport(message) => WorkflowError::Transport(message),
            ServiceFailure::Status { status, message } => {
                WorkflowError::Service { status, message }
            }
        }
    }
}

impl WorkflowError {
    pub fn region(&self) -> ErrorRegion {
        match self {
            WorkflowError::Validation(_) | WorkflowError::Precondition(PreconditionError::NoImage) => {
                ErrorRegion::Upload
            }
            _ => ErrorRegion::Process,
        }
    }

    /// Text shown in the inline region and the failure toast.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Transport(message) | WorkflowError::Service { message, .. } => {
                format!("Processing failed: {message}")
            }
            other => other.to_string(),
        }
    }

    /// `false` for guard rejections the user cannot trigger through an enabled control.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, WorkflowError::SubmissionInFlight)
    }
}
