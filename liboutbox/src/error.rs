//! Error types for Outbox
//!
//! Library code returns [`Error`]; the facade, watcher and CLI wrap it in
//! `anyhow` with context.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for Outbox - convenience wrapper around Result<T, Error>
pub type Result<T> = std::result::Result<T, Error>;

/// Custom error types for Outbox
#[derive(Debug)]
pub enum Error {
    /// An IO error
    Io(io::Error),

    /// The name pattern did not compile
    Pattern(String),

    /// Invalid configuration
    Config(String),

    /// One file could not be transferred; the session is still usable
    File { path: PathBuf, reason: String },

    /// The remote session could not be opened or was lost
    Session(String),
}

impl Error {
    pub fn file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// `true` when the rest of the batch cannot proceed on this session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Pattern(msg) => write!(f, "Invalid name pattern: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::File { path, reason } => {
                write!(f, "Transfer of {} failed: {}", path.display(), reason)
            }
            Self::Session(msg) => write!(f, "Session error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
