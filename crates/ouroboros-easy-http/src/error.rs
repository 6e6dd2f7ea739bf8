//! Error taxonomy shared by every client operation

use std::fmt;

use thiserror::Error;

use crate::transport::{TransportCode, TransportError};

/// Classification of a call outcome.
///
/// `Ok` exists so callers can flatten a [`HttpResult`] into a plain code
/// with [`ErrorKind::of`]; an [`Error`] value never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call succeeded
    Ok,
    /// Transport or configuration failure
    NetworkError,
    /// Transport-enforced timeout
    TimedOut,
    /// Round-trip completed but the status was outside 2xx
    RemoteError,
    /// A caller-supplied value was rejected
    InvalidArgument,
    /// Transport handle could not be acquired
    Uninitialized,
    /// Client settings could not be applied
    ConfigurationError,
}

impl ErrorKind {
    /// Returns the kind as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NetworkError => "network error",
            Self::TimedOut => "timed out",
            Self::RemoteError => "remote error",
            Self::InvalidArgument => "invalid argument",
            Self::Uninitialized => "uninitialized",
            Self::ConfigurationError => "configuration error",
        }
    }

    /// Flatten a call result into its kind.
    pub fn of<T>(result: &HttpResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.kind(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call: what went wrong and the transport's diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

/// Result type for client operations
pub type HttpResult<T> = Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(kind != ErrorKind::Ok, "an Error never carries ErrorKind::Ok");
        debug_assert!(!message.is_empty(), "error messages are never empty");
        Self { kind, message }
    }

    /// Error for a response whose status fell outside 2xx.
    pub fn remote(status: u16) -> Self {
        Self::new(ErrorKind::RemoteError, format!("HTTP {}", status))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::TimedOut
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::NetworkError
    }

    pub fn is_remote(&self) -> bool {
        self.kind == ErrorKind::RemoteError
    }

    /// The HTTP status carried by a `RemoteError`.
    pub fn status_code(&self) -> Option<u16> {
        if self.kind != ErrorKind::RemoteError {
            return None;
        }
        self.message.strip_prefix("HTTP ")?.trim().parse().ok()
    }

    /// Sanitize error message (remove sensitive info like credentials, internal IPs)
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.message)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        translate(err)
    }
}

/// Map a transport failure onto the public taxonomy.
///
/// Timeouts become `TimedOut`; every other code is a `NetworkError`.
pub fn translate(err: TransportError) -> Error {
    let diagnostic = err.diagnostic();
    match err.code() {
        TransportCode::OperationTimedOut => Error::new(
            ErrorKind::TimedOut,
            format!("request timed out: {}", diagnostic),
        ),
        _ => Error::new(
            ErrorKind::NetworkError,
            format!("transport error: {}", diagnostic),
        ),
    }
}

/// Translate a transport result, passing successes through untouched.
pub fn check<T>(result: Result<T, TransportError>) -> HttpResult<T> {
    result.map_err(translate)
}

/// Sanitize error messages by removing sensitive information
fn sanitize_error_message(msg: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static URL_CREDS_RE: OnceLock<Regex> = OnceLock::new();
    static INTERNAL_IP_RE: OnceLock<Regex> = OnceLock::new();
    static AUTH_HEADER_RE: OnceLock<Regex> = OnceLock::new();

    let url_creds_re = URL_CREDS_RE
        .get_or_init(|| Regex::new(r"(https?)://[^@/\s:]+:[^@/\s]+@").expect("valid regex"));
    let internal_ip_re = INTERNAL_IP_RE.get_or_init(|| {
        Regex::new(r"\b(10\.\d+|172\.(1[6-9]|2[0-9]|3[01])|192\.168)\.\d+\.\d+\b")
            .expect("valid regex")
    });
    let auth_header_re = AUTH_HEADER_RE.get_or_init(|| {
        Regex::new(r"(?i)(authorization:\s*(basic|bearer)|bearer|api[_-]?key|token)\s*[:=]?\s*\S+")
            .expect("valid regex")
    });

    let sanitized = url_creds_re.replace_all(msg, "$1://[REDACTED]@");
    let sanitized = internal_ip_re.replace_all(&sanitized, "[INTERNAL_IP]");
    let sanitized = auth_header_re.replace_all(&sanitized, "$1: [REDACTED]");

    sanitized.to_string()
}
