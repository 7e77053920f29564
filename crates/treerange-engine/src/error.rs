use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by range, selection and serialization operations.
///
/// Every error is reported to the immediate caller; the tree is left as of the
/// last operation that completed successfully.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("offset {offset} is out of bounds for length {length}")]
    IndexSize { offset: usize, length: usize },

    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("positions belong to different documents or trees")]
    WrongDocument,

    #[error("bad boundary points: {0}")]
    BadBoundaryPoints(String),

    #[error("invalid serialized range {input:?}: {reason}")]
    InvalidSerialization { input: String, reason: String },

    #[error("checksum mismatch: serialized {expected}, document {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl Error {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub(crate) fn hierarchy(msg: impl Into<String>) -> Self {
        Error::HierarchyRequest(msg.into())
    }

    pub(crate) fn node_type(msg: impl Into<String>) -> Self {
        Error::InvalidNodeType(msg.into())
    }

    pub(crate) fn serialization(input: &str, reason: impl Into<String>) -> Self {
        Error::InvalidSerialization {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
