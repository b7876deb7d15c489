use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Stripe answered with a non-success status and an error body.
    Stripe {
        /// HTTP status code returned by the API.
        status: u16,
        /// Stripe error `type` (e.g. `invalid_request_error`), when present.
        kind: Option<String>,
        /// Human readable message from the error body.
        message: String,
    },
    /// Transport or decoding failure while talking to an external API.
    ExternalApiError(String),
    /// Input rejected before any request was made.
    InvalidInput(String),
    /// Filesystem error.
    IoError(std::io::Error),
    /// JSON encoding/decoding error.
    SerializationError(serde_json::Error),
    /// CSV encoding error.
    CsvError(csv::Error),
    /// The snapshot file no longer matches its recorded checksum.
    SnapshotCorrupted(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Stripe {
                status,
                kind,
                message,
            } => match kind {
                Some(kind) => write!(f, "Stripe error {} ({}): {}", status, kind, message),
                None => write!(f, "Stripe error {}: {}", status, message),
            },
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::IoError(e) => write!(f, "I/O error: {}", e),
            AppError::SerializationError(e) => write!(f, "Serialization error: {}", e),
            AppError::CsvError(e) => write!(f, "CSV error: {}", e),
            AppError::SnapshotCorrupted(msg) => write!(f, "Snapshot corrupted: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::IoError(e) => Some(e),
            AppError::SerializationError(e) => Some(e),
            AppError::CsvError(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err)
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::CsvError(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}
