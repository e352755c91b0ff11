use std::error;
use std::fmt;

/// Convenient result type for status store operations using [`DrError`] as the error type.
pub type DrResult<T> = Result<T, DrError>;

/// Main error type for replication status operations.
///
/// [`DrError`] carries an [`ErrorKind`] for programmatic handling, a static
/// description, and optionally a dynamic detail string with the operation
/// context (path, offending record, underlying cause).
#[derive(Debug, Clone)]
pub struct DrError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
///
/// Users should not interact with this type directly but use [`DrError`] methods instead.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Error with kind and static description
    WithDescription(ErrorKind, &'static str),
    /// Error with kind, static description, and dynamic detail
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
}

/// Categories of errors that can occur while tracking replication status.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Base or store location missing or with wrong permissions. Fatal at
    /// construction, never retried.
    ConfigError,
    /// An outcome references the wrong job, or a status is applied at the
    /// wrong granularity or to the wrong database.
    ValidationError,
    /// Read/write/rename/delete failure against the backing store.
    IoError,
    /// A status could not be rendered as JSON.
    SerializationError,
    /// Malformed persisted or input JSON.
    DeserializationError,
}

impl DrError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for DrError {
    fn eq(&self, other: &DrError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for DrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
        }
    }
}

impl error::Error for DrError {}

/// Creates a [`DrError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for DrError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> DrError {
        DrError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Creates a [`DrError`] from an error kind, static description, and dynamic detail.
impl From<(ErrorKind, &'static str, String)> for DrError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> DrError {
        DrError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

/// Converts [`std::io::Error`] to [`DrError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for DrError {
    fn from(err: std::io::Error) -> DrError {
        DrError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`] to [`DrError`] with appropriate error kind.
///
/// Maps to [`ErrorKind::DeserializationError`] for malformed input and
/// [`ErrorKind::SerializationError`] otherwise, based on error classification.
impl From<serde_json::Error> for DrError {
    fn from(err: serde_json::Error) -> DrError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        DrError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}
