//! Error types for the metric index.

use std::io;

use thiserror::Error;

use crate::page::PageId;

/// Result type for metric index operations
pub type MTreeResult<T> = Result<T, MTreeError>;

/// Errors that can occur during metric index operations
#[derive(Debug, Error)]
pub enum MTreeError {
    /// I/O error from the backing file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Node serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid construction-time configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// On-disk data does not match the expected format
    #[error("corrupt page format: {0}")]
    CorruptFormat(String),

    /// An internal structural invariant was violated
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An error annotated with the page operation that produced it
    #[error("{operation} failed for page {page}: {source}")]
    PageOp {
        operation: &'static str,
        page: PageId,
        #[source]
        source: Box<MTreeError>,
    },
}

impl MTreeError {
    /// Wraps this error with the operation and page id that produced it.
    pub fn in_operation(self, operation: &'static str, page: PageId) -> Self {
        MTreeError::PageOp {
            operation,
            page,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MTreeError::Configuration("page size must be non-zero".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: page size must be non-zero"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err: MTreeError = io_err.into();
        assert!(matches!(err, MTreeError::Io(_)));
    }

    #[test]
    fn test_page_op_context() {
        let err = MTreeError::CorruptFormat("bad marker".to_string()).in_operation("read node", 7);
        assert_eq!(
            err.to_string(),
            "read node failed for page 7: corrupt page format: bad marker"
        );
    }
}
