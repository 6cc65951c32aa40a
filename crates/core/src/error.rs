//! Error types for vitre derived views.

use alloc::string::String;
use core::fmt;

/// Result type alias for vitre operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for view operations.
///
/// These describe contract violations and API misuse; a correct caller
/// never triggers them. Internal index-bookkeeping inconsistencies are
/// bugs, not errors, and fail via assertions instead.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// An index was out of bounds for the collection.
    InvalidIndex {
        index: usize,
        len: usize,
    },
    /// An index-based removal or replacement did not match the expected item.
    ItemMismatch {
        index: usize,
    },
    /// Equality-based resolution found no matching item.
    NotFound,
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidIndex { index, len } => {
                write!(f, "Index {} out of bounds for length {}", index, len)
            }
            Error::ItemMismatch { index } => {
                write!(f, "Item at index {} does not match the expected item", index)
            }
            Error::NotFound => {
                write!(f, "No matching item found")
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates an invalid index error.
    pub fn invalid_index(index: usize, len: usize) -> Self {
        Error::InvalidIndex { index, len }
    }

    /// Creates an item mismatch error.
    pub fn item_mismatch(index: usize) -> Self {
        Error::ItemMismatch { index }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_index(5, 3);
        assert!(err.to_string().contains("5"));
        assert!(err.to_string().contains("3"));

        let err = Error::invalid_operation("end_batch without begin_batch");
        assert!(err.to_string().contains("end_batch"));

        let err = Error::NotFound;
        assert!(err.to_string().contains("No matching item"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::item_mismatch(2);
        match err {
            Error::ItemMismatch { index } => assert_eq!(index, 2),
            _ => panic!("Wrong error type"),
        }
    }
}
