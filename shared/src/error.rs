//! Errors raised by the state tree and the subscription registry.

/// Structural errors when reading or mutating the state tree, or when
/// registering a malformed subscription pattern.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    /// Nothing is stored at the given path.
    #[error("no value at path `{0}`")]
    MissingPath(String),

    /// A path walked through a leaf where a record was expected.
    #[error("value at `{0}` is not a record")]
    NotARecord(String),

    /// A leaf exists but holds a different kind of value.
    #[error("value at `{path}` is a {found}, expected a {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The path is empty or addresses the root itself.
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
