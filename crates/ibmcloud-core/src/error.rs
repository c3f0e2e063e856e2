//! Error types for the provider
//!
//! Every adapter, the connection layer and the engine share this error type.
//! Remote failures keep their HTTP status so callers can tell "already gone"
//! (404) apart from everything else.

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the provider
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value failed schema validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider or engine configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Composite identifier could not be decoded
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Remote object does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote API answered with a non-success status
    #[error("{service} API error ({status}): {message}")]
    Api {
        /// Service that produced the error (dns, appid, satellite, iam)
        service: String,
        /// HTTP status code
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// Authentication errors (IAM exchange, 401, 403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport-level HTTP failures
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An inner error annotated with what was being attempted
    #[error("{context}: {source}")]
    Wrapped {
        /// What the caller was doing
        context: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid ID error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an API error for a service
    pub fn api(service: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Wrap this error with a contextual message
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the remote object is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::RateLimited(_) | Self::Http(_) => true,
            Self::Api { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Attach context to fallible provider operations
pub trait ErrorContext<T> {
    /// Wrap the error with a fixed message
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built message
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.wrap(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.wrap(f()))
    }
}

/// Turn "the remote object is gone" into a value
pub trait NotFoundExt<T> {
    /// `Ok(None)` on 404, every other error unchanged
    fn or_gone(self) -> Result<Option<T>>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn or_gone(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_seen_through_context() {
        let err: Result<()> = Err(Error::not_found("zone abc"));
        let wrapped = err.context("Error reading DNS zone").unwrap_err();

        assert!(wrapped.is_not_found());
        assert_eq!(wrapped.status(), Some(404));
        assert_eq!(
            wrapped.to_string(),
            "Error reading DNS zone: Not found: zone abc"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::rate_limited("slow down").is_retryable());
        assert!(Error::api("dns", 503, "unavailable").is_retryable());
        assert!(!Error::api("dns", 400, "bad request").is_retryable());
        assert!(!Error::not_found("x").is_retryable());
    }

    #[test]
    fn test_or_gone() {
        let gone: Result<u8> = Err(Error::not_found("zone"));
        assert!(gone.or_gone().unwrap().is_none());

        let found: Result<u8> = Ok(7);
        assert_eq!(found.or_gone().unwrap(), Some(7));

        let failed: Result<u8> = Err(Error::api("dns", 500, "boom"));
        assert!(failed.or_gone().is_err());
    }
}
