//! Error types for the formset runtime

use crate::path::{FieldPath, PathError};
use crate::upload::HandleId;
use formset_parser::ParseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type FormsetResult<T> = Result<T, FormsetError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormsetError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown field '{0}'")]
    UnknownField(FieldPath),

    #[error("Unknown collection '{0}'")]
    UnknownCollection(FieldPath),

    #[error("Collection '{collection}' has no instance at position {index}")]
    NoSuchInstance { collection: FieldPath, index: usize },

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("Field '{0}' is not a file input")]
    NotAFileField(FieldPath),

    #[error("Unknown control '{0}'")]
    UnknownControl(String),

    #[error("Control '{control}' has no usable action chain: {reason}")]
    ControlUnavailable { control: String, reason: String },

    #[error("Control '{0}' is not waiting for a result")]
    NotSuspended(String),

    #[error("Control '{control}' is waiting for {expected}, not {received}")]
    UnexpectedResolution {
        control: String,
        expected: &'static str,
        received: &'static str,
    },

    #[error("Upload {0} has not settled yet")]
    UploadPending(HandleId),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Raised when an add or remove would break a collection's cardinality
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error("Collection '{collection}' already holds the maximum of {max} instance(s)")]
    AtMaximum { collection: FieldPath, max: usize },

    #[error("Collection '{collection}' must keep at least {min} instance(s)")]
    AtMinimum { collection: FieldPath, min: usize },
}

/// Failure of one exchange with the server endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    #[error("No session token available (expected in ${0})")]
    MissingSessionToken(String),

    #[error("The server rejected the session token")]
    SessionRejected,

    #[error("Server responded with status {status}")]
    Status { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed server response: {0}")]
    Decode(String),
}

/// Failure of one file transfer; reported on the owning field
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadError {
    #[error("File upload failed: {0}")]
    Transfer(String),

    #[error("File upload refused by the server (status {0})")]
    Refused(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Init-time problem with one declarative attribute
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Problem {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("condition depends on itself through '{0}'")]
    Circular(String),
}

/// A rejected attribute, kept so hosts can report it without failing init
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Declaration path of the owning node, or `control '<name>'`
    pub origin: String,
    pub attribute: String,
    pub text: String,
    pub problem: Problem,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.origin, self.attribute, self.problem)
    }
}
