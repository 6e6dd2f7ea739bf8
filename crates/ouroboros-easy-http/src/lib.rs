//! ouroboros-easy-http: blocking single-handle HTTP client
//!
//! One [`HttpClient`] owns one reusable transport handle and runs one GET or
//! POST at a time on the calling thread. Every failure comes back as an
//! [`Error`] whose [`ErrorKind`] tells a transport problem, a timeout and a
//! non-2xx status apart; there is no retrying at this layer.
//!
//! # Architecture
//!
//! - `error`: the error taxonomy and the translation from transport failures
//! - `transport`: the [`Transport`] seam, its reqwest-backed implementation,
//!   process-wide initialization, header and DNS override handling
//! - `client`: configuration state, request assembly and status checking
//! - `config`: [`ClientConfig`] and the authentication modes

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::HttpClient;
pub use config::{AuthMode, AuthType, ClientConfig};
pub use error::{Error, ErrorKind, HttpResult};
pub use transport::{ReqwestTransport, Transport, TransportCode, TransportError};
