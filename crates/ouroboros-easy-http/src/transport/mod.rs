//! Adapter over the HTTP engine that performs the actual network I/O
//!
//! The client never talks to the engine directly. It describes a request with
//! [`TransferRequest`], hands it to a [`Transport`] together with an append
//! sink, and afterwards asks the transport for the status code and the
//! number of connections the transfer had to open.
//!
//! [`ReqwestTransport`] is the production implementation.

mod connect;
pub mod dns;
mod engine;
mod headers;

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use http::Method;

use crate::config::AuthMode;

pub use dns::{DnsLookupError, DnsServers};
pub use engine::ReqwestTransport;
pub use headers::HeaderList;

/// Failure codes reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    /// The engine or its I/O driver could not be set up
    FailedInit,
    /// URL scheme is not http or https
    UnsupportedProtocol,
    UrlMalformed,
    CouldNotResolveHost,
    CouldNotConnect,
    /// Status >= 400 while fail-on-error is enabled
    HttpReturnedError,
    /// The append sink accepted fewer bytes than offered
    WriteError,
    OperationTimedOut,
    SendError,
    RecvError,
    /// A request setting had an unusable value
    BadFunctionArgument,
}

impl TransportCode {
    /// Generic description of the code, independent of any request.
    pub fn description(&self) -> &'static str {
        match self {
            Self::FailedInit => "failed initialization",
            Self::UnsupportedProtocol => "unsupported protocol",
            Self::UrlMalformed => "URL using bad/illegal format or missing URL",
            Self::CouldNotResolveHost => "couldn't resolve host name",
            Self::CouldNotConnect => "couldn't connect to server",
            Self::HttpReturnedError => "HTTP response code said error",
            Self::WriteError => "failed writing received data to the destination",
            Self::OperationTimedOut => "timeout was reached",
            Self::SendError => "failed sending data to the peer",
            Self::RecvError => "failure when receiving data from the peer",
            Self::BadFunctionArgument => "a request setting was given a bad argument",
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A failure code plus the request-scoped detail the engine produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    code: TransportCode,
    detail: String,
}

impl TransportError {
    pub fn new(code: TransportCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// A failure without request-scoped detail.
    pub fn from_code(code: TransportCode) -> Self {
        Self::new(code, String::new())
    }

    pub fn code(&self) -> TransportCode {
        self.code
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// `"<generic>: <detail>"`, or just the generic text when there is no detail.
    pub fn diagnostic(&self) -> String {
        if self.detail.is_empty() {
            self.code.description().to_string()
        } else {
            format!("{}: {}", self.code.description(), self.detail)
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic())
    }
}

impl std::error::Error for TransportError {}

/// Everything a transport needs to run one request.
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a HeaderList,
    /// Present for POST
    pub body: Option<&'a Bytes>,
    pub auth: &'a AuthMode,
    pub verbose: bool,
    pub fail_on_http_error: bool,
    /// Prepend the status line and response headers to the delivered bytes
    pub return_headers: bool,
    /// Whole-transfer limit
    pub timeout: Option<Duration>,
    pub dns_servers: Option<&'a DnsServers>,
}

/// A synchronous HTTP engine handle.
///
/// Implementations run one request at a time on the calling thread.
pub trait Transport {
    /// Run the request, handing every received chunk to `sink` in arrival order.
    ///
    /// `sink` returns how many bytes it accepted; anything short of the full
    /// chunk aborts the transfer with [`TransportCode::WriteError`].
    fn perform(
        &mut self,
        request: &TransferRequest<'_>,
        sink: &mut dyn FnMut(&[u8]) -> usize,
    ) -> Result<(), TransportError>;

    /// Status code of the last response received by [`Transport::perform`].
    fn response_code(&self) -> Result<u16, TransportError>;

    /// Connections newly established by the last [`Transport::perform`].
    fn num_connects(&self) -> Result<u32, TransportError>;
}

static GLOBAL_INIT: OnceLock<Result<(), TransportError>> = OnceLock::new();

/// Process-wide engine setup.
///
/// Runs exactly once; concurrent first callers block until the winner has
/// finished and then observe its result.
pub fn global_init() -> Result<(), TransportError> {
    GLOBAL_INIT
        .get_or_init(|| {
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                tracing::debug!("TLS crypto provider already installed, keeping it");
            }
            if rustls::crypto::CryptoProvider::get_default().is_none() {
                return Err(TransportError::new(
                    TransportCode::FailedInit,
                    "no TLS crypto provider available",
                ));
            }
            tracing::debug!("transport initialized");
            Ok(())
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_with_detail() {
        let err = TransportError::new(TransportCode::CouldNotConnect, "connection refused");
        assert_eq!(
            err.diagnostic(),
            "couldn't connect to server: connection refused"
        );
        assert_eq!(err.to_string(), err.diagnostic());
    }

    #[test]
    fn test_diagnostic_without_detail() {
        let err = TransportError::from_code(TransportCode::WriteError);
        assert_eq!(
            err.diagnostic(),
            "failed writing received data to the destination"
        );
        assert!(err.detail().is_empty());
    }

    #[test]
    fn test_global_init_is_idempotent() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(global_init))
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert!(global_init().is_ok());
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }
}
