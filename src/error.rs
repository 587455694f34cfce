//! Global error handling for fs2dad
//!
//! Configuration and write failures travel through this type up to the
//! caller. Problems with a single file never do: the scanner turns them into
//! markers embedded in the document.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Global error type for fs2dad operations
#[derive(Error, Debug)]
pub enum Fs2DadError {
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A glob pattern that cannot be compiled
    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regular expression errors
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Scanner errors
    #[error("Scanner error: {0}")]
    Scanner(String),

    /// The output document could not be written
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),
}

/// Specialized Result type for fs2dad operations
pub type Result<T> = std::result::Result<T, Fs2DadError>;

impl Fs2DadError {
    /// True for errors raised before any traversal happens
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Pattern { .. } | Self::PathNotFound(_) | Self::Json(_)
        )
    }
}

/// Creates a Fs2DadError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::Fs2DadError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for attaching an output path to I/O failures
pub trait WriteResultExt<T> {
    /// Convert an I/O error into [`Fs2DadError::Write`] for `path`
    fn for_output(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> WriteResultExt<T> for std::result::Result<T, io::Error> {
    fn for_output(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Fs2DadError::Write {
            path: path.into(),
            source,
        })
    }
}

// Lets the binary keep an io::Result main
impl From<Fs2DadError> for io::Error {
    fn from(err: Fs2DadError) -> Self {
        let kind = match &err {
            Fs2DadError::Io(e) => e.kind(),
            Fs2DadError::Write { source, .. } => source.kind(),
            Fs2DadError::PathNotFound(_) => io::ErrorKind::NotFound,
            Fs2DadError::Config(_) | Fs2DadError::Pattern { .. } => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_threads(n: usize) -> Result<usize> {
        crate::ensure!(n > 0, Config, "thread count must be at least 1, got {}", n);
        Ok(n)
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(check_threads(2).unwrap(), 2);
        let err = check_threads(0).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration error: thread count must be at least 1, got 0"
        );
    }

    #[test]
    fn test_write_error_keeps_kind() {
        let failed: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let err = failed.for_output("/nowhere/out.xml").unwrap_err();
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("/nowhere/out.xml"));

        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
    }
}
