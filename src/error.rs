//! Error types for manifest processing
//!
//! Errors carry the stage that failed and, for per-document failures, the
//! zero-based index of the offending document in the input stream. The
//! underlying cause is always reachable through `std::error::Error::source`.

use thiserror::Error;

/// Boxed error produced by a caller-supplied document transform
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for manifest operations
#[derive(Debug, Error)]
pub enum Error {
    /// A document could not be decoded into a structural value
    #[error("failed to decode manifest document {index}: {message}")]
    Decode {
        /// Position of the document in the input stream
        index: usize,
        /// Description of what failed
        message: String,
        /// The underlying YAML error, if the decoder produced one
        #[source]
        source: Option<serde_yaml::Error>,
    },

    /// A decoded document could not be serialized back to YAML
    #[error("failed to marshal manifest document {index}: {source}")]
    Encode {
        /// Position of the document in the input stream
        index: usize,
        /// The underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// The caller-supplied post-process step rejected a document
    #[error("failed to post process manifest document {index}: {source}")]
    Transform {
        /// Position of the document in the input stream
        index: usize,
        /// The error returned by the transform
        #[source]
        source: BoxError,
    },

    /// The manifest does not have the shape a Kubernetes resource requires
    #[error("invalid kubernetes manifest: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "metadata.namespace")
        field: Option<String>,
    },
}

impl Error {
    /// Create a decode error wrapping a YAML parser error
    pub fn decode(index: usize, source: serde_yaml::Error) -> Self {
        Self::Decode {
            index,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a decode error for a structurally valid document of the wrong shape
    pub fn decode_shape(index: usize, msg: impl Into<String>) -> Self {
        Self::Decode {
            index,
            message: msg.into(),
            source: None,
        }
    }

    /// Create an encode error
    pub fn encode(index: usize, source: serde_yaml::Error) -> Self {
        Self::Encode { index, source }
    }

    /// Create a transform error preserving the transform's own error as cause
    pub fn transform(index: usize, source: impl Into<BoxError>) -> Self {
        Self::Transform {
            index,
            source: source.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Get the document index if this error is tied to a single document
    pub fn document_index(&self) -> Option<usize> {
        match self {
            Error::Decode { index, .. } => Some(*index),
            Error::Encode { index, .. } => Some(*index),
            Error::Transform { index, .. } => Some(*index),
            Error::Validation { .. } => None,
        }
    }

    /// Get the offending field path for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}
