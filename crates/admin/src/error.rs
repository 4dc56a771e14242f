//! Admin error types.

use shopfront_storefront::api::{ApiError, FieldErrors};
use thiserror::Error;

/// Errors from admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Backend call failed, including 422 validation failures.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An image file could not be read.
    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The image type is not one the backend accepts.
    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    /// Building the multipart body failed.
    #[error("Invalid multipart field: {0}")]
    Multipart(#[source] reqwest::Error),
}

impl AdminError {
    /// Field errors to show next to the form, when the backend rejected it.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Api(err) => err.field_errors(),
            _ => None,
        }
    }
}

/// Result type alias for `AdminError`.
pub type Result<T> = std::result::Result<T, AdminError>;
