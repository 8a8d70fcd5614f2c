//! Error types shared by every component.
//!
//! A single error struct carries an [`ErrorKind`] that places the failure in
//! one of four classes:
//! - input contract violations (bad body, bad address, malformed DSN)
//! - resolution failures (no controller, no backend for a descriptor)
//! - runtime failures raised while a controller runs
//! - fatal contract breaches (a controller that returns no response)

use std::fmt;
use thiserror::Error;

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;

/// Error kinds categorizing different failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Input contract violations
    /// An operation was called in a state where it cannot succeed.
    Logic,
    /// An argument has the wrong shape.
    InvalidArgument,
    /// An email address failed validation.
    InvalidAddress,
    /// A header name or value cannot be written.
    InvalidHeader,
    /// A configuration value or connection string is invalid.
    ConfigurationInvalid,

    // Resolution failures
    /// No controller matches the request.
    NotFound,
    /// No backend matches the descriptor.
    UnsupportedBackend,
    /// The resolved client cannot provide a requested mode.
    UnsupportedCapability,

    // Runtime failures
    /// Failure carrying an HTTP status code.
    Http,
    /// Generic runtime failure raised by a controller or listener.
    Runtime,
    /// Reading a stream or file failed.
    Io,
    /// A lock is held by another owner.
    LockConflicted,
    /// A lock expired before the operation completed.
    LockExpired,

    // Fatal contract breaches
    /// A controller returned something that is not a response and no view
    /// listener converted it.
    ControllerContract,

    // Generic
    /// Unknown or internal error.
    Unknown,
}

impl ErrorKind {
    /// Returns true if the kernel may route this kind through its exception
    /// listeners.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorKind::ControllerContract)
    }

    /// Returns the severity level of this error kind.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorKind::ControllerContract
            | ErrorKind::Runtime
            | ErrorKind::Io
            | ErrorKind::Unknown => ErrorSeverity::Critical,

            ErrorKind::Logic
            | ErrorKind::InvalidArgument
            | ErrorKind::InvalidAddress
            | ErrorKind::InvalidHeader
            | ErrorKind::ConfigurationInvalid
            | ErrorKind::UnsupportedBackend
            | ErrorKind::UnsupportedCapability => ErrorSeverity::Error,

            ErrorKind::NotFound | ErrorKind::Http | ErrorKind::LockConflicted => ErrorSeverity::Warning,

            ErrorKind::LockExpired => ErrorSeverity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Logic => write!(f, "Logic error"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::InvalidAddress => write!(f, "Invalid address"),
            ErrorKind::InvalidHeader => write!(f, "Invalid header"),
            ErrorKind::ConfigurationInvalid => write!(f, "Invalid configuration"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::UnsupportedBackend => write!(f, "Unsupported backend"),
            ErrorKind::UnsupportedCapability => write!(f, "Unsupported capability"),
            ErrorKind::Http => write!(f, "HTTP error"),
            ErrorKind::Runtime => write!(f, "Runtime error"),
            ErrorKind::Io => write!(f, "I/O error"),
            ErrorKind::LockConflicted => write!(f, "Lock conflicted"),
            ErrorKind::LockExpired => write!(f, "Lock expired"),
            ErrorKind::ControllerContract => write!(f, "Controller contract violation"),
            ErrorKind::Unknown => write!(f, "Unknown error"),
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - expected scenario.
    Info,
    /// Warning - client-side problem, the application is healthy.
    Warning,
    /// Error - operation failed.
    Error,
    /// Critical - requires immediate attention.
    Critical,
}

/// Framework error with detailed information.
#[derive(Error, Debug)]
pub struct FrameworkError {
    /// Error kind.
    kind: ErrorKind,
    /// Human-readable message.
    message: String,
    /// HTTP status code for HTTP-classified failures.
    status_code: Option<u16>,
    /// Extra response headers for HTTP-classified failures.
    headers: Vec<(String, String)>,
    /// Underlying cause.
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FrameworkError {
    /// Creates a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            headers: Vec::new(),
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Adds a header to send along with the error response.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status code if available.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the extra response headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns true if this error carries an HTTP status code.
    pub fn is_http(&self) -> bool {
        self.status_code.is_some()
    }

    /// Returns the error severity.
    ///
    /// HTTP failures below 500 are client problems; everything else that
    /// reaches the kernel unhandled is critical.
    pub fn severity(&self) -> ErrorSeverity {
        match self.status_code {
            Some(code) if code >= 500 => ErrorSeverity::Critical,
            Some(_) => ErrorSeverity::Error,
            None => self.kind.severity(),
        }
    }

    // Convenience constructors

    /// Creates a logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Logic, message)
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Creates an invalid-address error.
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAddress, message)
    }

    /// Creates an I/O error wrapping the underlying cause.
    pub fn io(message: impl Into<String>, cause: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, message).with_cause(cause)
    }

    /// Creates an HTTP error with the given status code.
    pub fn http(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http, message).with_status_code(status_code)
    }

    /// Creates a 404 error raised when no controller matches.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message).with_status_code(404)
    }

    /// Creates a 403 error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::http(403, message)
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// Creates a controller contract error.
    pub fn controller_contract(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ControllerContract, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationInvalid, message)
    }

    /// Creates an unsupported-backend error.
    pub fn unsupported_backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedBackend, message)
    }

    /// Creates a lock-conflicted error.
    pub fn lock_conflicted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockConflicted, message)
    }

    /// Creates a lock-expired error.
    pub fn lock_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockExpired, message)
    }

    /// Creates an unsupported-capability error.
    pub fn unsupported_capability(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedCapability, message)
    }
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        Ok(())
    }
}

impl From<std::io::Error> for FrameworkError {
    fn from(error: std::io::Error) -> Self {
        let message = error.to_string();
        FrameworkError::io(message, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_recoverable() {
        assert!(ErrorKind::Runtime.is_recoverable());
        assert!(ErrorKind::NotFound.is_recoverable());
        assert!(ErrorKind::Http.is_recoverable());
        assert!(!ErrorKind::ControllerContract.is_recoverable());
    }

    #[test]
    fn test_not_found_carries_status() {
        let err = FrameworkError::not_found("Unable to find the controller for path \"/x\".");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), Some(404));
        assert!(err.is_http());
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(FrameworkError::runtime("boom").severity(), ErrorSeverity::Critical);
        assert_eq!(FrameworkError::access_denied("no").severity(), ErrorSeverity::Error);
        assert_eq!(FrameworkError::http(503, "down").severity(), ErrorSeverity::Critical);
        assert_eq!(
            ErrorKind::ConfigurationInvalid.severity(),
            ErrorSeverity::Error
        );
    }

    #[test]
    fn test_display() {
        let err = FrameworkError::http(418, "teapot").with_header("X-Reason", "tea");
        assert_eq!(err.to_string(), "HTTP error: teapot (HTTP 418)");
        assert_eq!(err.headers(), &[("X-Reason".to_string(), "tea".to_string())]);
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FrameworkError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
