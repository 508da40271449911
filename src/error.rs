//! Library error types.

use std::fmt;

use crate::MAX_DOCUMENT_SIZE;

/// A bsonic Result, normally returning a bsonic [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A bsonic error. Encompasses any issue that can happen while building
/// values, reading or writing the binary form, or converting to and from
/// Extended JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// User-supplied input is malformed: bad hex, bad base64, a
    /// Decimal128 string outside the representable range, a reserved
    /// binary subtype, and the like. The message names the offending
    /// input.
    InvalidArgument(String),
    /// The wire bytes are inconsistent: a short read, a length field
    /// that disagrees with the data, or an unknown type tag. Carries the
    /// byte offset of the failure when one is known.
    Internal {
        /// Offset from the start of the buffer being read, if known.
        offset: Option<usize>,
        /// What went wrong.
        message: String,
    },
    /// The API was misused, such as an out-of-range index.
    Logic(String),
    /// A mutation would grow a document past the envelope size limit.
    DocumentTooLarge {
        /// The size the document would have reached.
        actual: usize,
    },
    /// Extended JSON text did not describe a valid BSON value. Carries
    /// the trail of JSON keys leading to the offending node.
    DataCorrupted {
        /// Keys from the document root down to the failure.
        key_path: Vec<String>,
        /// What went wrong at that node.
        message: String,
    },
    /// A value of one BSON type was requested as another.
    TypeMismatch {
        /// The key that was accessed.
        key: String,
        /// The requested type.
        expected: &'static str,
        /// The type actually held.
        actual: &'static str,
    },
}

impl Error {
    /// Wire-format error at a known byte offset.
    pub(crate) fn internal_at(offset: usize, message: impl Into<String>) -> Self {
        Error::Internal {
            offset: Some(offset),
            message: message.into(),
        }
    }

    /// Wire-format error with no useful offset.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            offset: None,
            message: message.into(),
        }
    }

    pub(crate) fn corrupted(key_path: &[String], message: impl Into<String>) -> Self {
        Error::DataCorrupted {
            key_path: key_path.to_vec(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArgument(ref msg) => write!(f, "invalid argument: {}", msg),
            Error::Internal {
                offset: Some(offset),
                ref message,
            } => write!(f, "bad wire data at offset {}: {}", offset, message),
            Error::Internal {
                offset: None,
                ref message,
            } => write!(f, "bad wire data: {}", message),
            Error::Logic(ref msg) => write!(f, "logic error: {}", msg),
            Error::DocumentTooLarge { actual } => write!(
                f,
                "document would be {} bytes, maximum allowed is {}",
                actual, MAX_DOCUMENT_SIZE
            ),
            Error::DataCorrupted {
                ref key_path,
                ref message,
            } => {
                if key_path.is_empty() {
                    f.write_str(message)
                } else {
                    write!(f, "{}: {}", key_path.join("."), message)
                }
            }
            Error::TypeMismatch {
                ref key,
                expected,
                actual,
            } => write!(f, "{}: expected {}, found {}", key, expected, actual),
        }
    }
}

impl std::error::Error for Error {}
