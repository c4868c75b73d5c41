use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ComplaintId;

#[derive(Error, Debug)]
pub enum GunasoError {
    #[error("Location is outside any known ward")]
    LocationOutOfBounds,

    #[error("Invalid tags: {0}")]
    InvalidTags(String),

    #[error("Image is required")]
    MissingImage,

    #[error("Already supporting complaint {0}")]
    DuplicateSupport(ComplaintId),

    #[error("Complaint {0} already rated by this user")]
    AlreadyRated(ComplaintId),

    #[error("Complaint {0} is not resolved yet")]
    NotResolved(ComplaintId),

    #[error("Complaint {0} is already resolved")]
    AlreadyResolved(ComplaintId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("No complaint draft found or it has expired")]
    DraftExpiredOrMissing,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i16),

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Stable machine-readable failure kind exposed to outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LocationOutOfBounds,
    InvalidTags,
    MissingImage,
    DuplicateSupport,
    AlreadyRated,
    NotResolved,
    AlreadyResolved,
    Unauthorized,
    DraftExpiredOrMissing,
    NotFound,
    InvalidRating,
    InvalidStatus,
    InvalidInput,
    Unavailable,
}

impl GunasoError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        GunasoError::NotFound(what.to_string())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        GunasoError::Unauthorized(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GunasoError::LocationOutOfBounds => ErrorKind::LocationOutOfBounds,
            GunasoError::InvalidTags(_) => ErrorKind::InvalidTags,
            GunasoError::MissingImage => ErrorKind::MissingImage,
            GunasoError::DuplicateSupport(_) => ErrorKind::DuplicateSupport,
            GunasoError::AlreadyRated(_) => ErrorKind::AlreadyRated,
            GunasoError::NotResolved(_) => ErrorKind::NotResolved,
            GunasoError::AlreadyResolved(_) => ErrorKind::AlreadyResolved,
            GunasoError::Unauthorized(_) => ErrorKind::Unauthorized,
            GunasoError::DraftExpiredOrMissing => ErrorKind::DraftExpiredOrMissing,
            GunasoError::NotFound(_) => ErrorKind::NotFound,
            GunasoError::InvalidRating(_) => ErrorKind::InvalidRating,
            GunasoError::InvalidStatus(_) => ErrorKind::InvalidStatus,
            GunasoError::InvalidInput(_) => ErrorKind::InvalidInput,
            GunasoError::Store(_) => ErrorKind::Unavailable,
        }
    }

    /// Message safe to show to the caller. Store failures never leak their cause.
    pub fn user_message(&self) -> String {
        match self {
            GunasoError::LocationOutOfBounds => "Location is outside any known ward.".into(),
            GunasoError::InvalidTags(_) => "Some tags are invalid.".into(),
            GunasoError::MissingImage => "Image is required. Please upload an image.".into(),
            GunasoError::DuplicateSupport(_) => "You have already supported this complaint.".into(),
            GunasoError::AlreadyRated(_) => "You have already rated this complaint.".into(),
            GunasoError::NotResolved(_) => "You can only rate resolved complaints.".into(),
            GunasoError::AlreadyResolved(_) => "Complaint is already marked resolved.".into(),
            GunasoError::Unauthorized(_) => {
                "You are not authorized to perform this action on this complaint.".into()
            }
            GunasoError::DraftExpiredOrMissing => {
                "No complaint draft found or it has expired.".into()
            }
            GunasoError::NotFound(_) => "Complaint not found.".into(),
            GunasoError::InvalidRating(_) => "Rating must be between 1 and 5.".into(),
            GunasoError::InvalidStatus(_) => "Invalid status value.".into(),
            GunasoError::InvalidInput(reason) => format!("Invalid input: {reason}."),
            GunasoError::Store(_) => "Service temporarily unavailable. Please try again.".into(),
        }
    }

    /// Only backing-store failures may succeed on a caller-side retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GunasoError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, GunasoError>;
