//! Error types for pagurus
//!
//! A single crate-wide error enum; fatal resolution/attach errors and the
//! recoverable mid-loop extraction error share it, the runner decides
//! which is which.

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A static field named an environment variable that is not set.
    MissingEnvVar(String),
    /// Write attempted after the sink was closed.
    SinkClosed,
    /// A record did not match the field count fixed at sink construction.
    FieldCountMismatch { expected: usize, got: usize },
    /// No process with this pid exists at attach time.
    ProcessNotFound(usize),
    /// The pid file never appeared within the retry budget.
    AttachTimeout { path: PathBuf, attempts: u32 },
    /// The pid file exists but its first line is not a decimal pid.
    InvalidPidFile(PathBuf),
    /// A required metric could not be extracted from the target process.
    Extraction(String),
    /// Invalid runner or sink configuration.
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingEnvVar(name) => {
                write!(f, "environment variable '{}' is not set", name)
            }
            Error::SinkClosed => write!(f, "write to a closed sink"),
            Error::FieldCountMismatch { expected, got } => {
                write!(f, "expected {} field values, got {}", expected, got)
            }
            Error::ProcessNotFound(pid) => {
                write!(f, "process with PID {} not found", pid)
            }
            Error::AttachTimeout { path, attempts } => {
                write!(
                    f,
                    "pid file {} did not appear after {} attempts",
                    path.display(),
                    attempts
                )
            }
            Error::InvalidPidFile(path) => {
                write!(
                    f,
                    "pid file {} does not contain a valid pid",
                    path.display()
                )
            }
            Error::Extraction(msg) => write!(f, "metric extraction failed: {}", msg),
            Error::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::MissingEnvVar("PAGURUS_TAG".to_string());
        assert_eq!(
            err.to_string(),
            "environment variable 'PAGURUS_TAG' is not set"
        );

        let err = Error::AttachTimeout {
            path: PathBuf::from("watch.pid"),
            attempts: 300,
        };
        assert_eq!(
            err.to_string(),
            "pid file watch.pid did not appear after 300 attempts"
        );

        let err = Error::FieldCountMismatch {
            expected: 14,
            got: 3,
        };
        assert_eq!(err.to_string(), "expected 14 field values, got 3");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(Error::SinkClosed.source().is_none());
    }
}
