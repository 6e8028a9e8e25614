//! Error types for the courier client.
//!
//! # Design
//! Two families are kept apart. `RequestError` covers anything that goes
//! wrong during a network exchange and is always recoverable; it is what
//! synchronous callers get back and what `Callback::on_error` receives.
//! `InvalidUsageError` is a programming error (missing callback, pool already
//! shut down) and is returned synchronously from the dispatching call, never
//! routed through a callback.
//!
//! Transport implementations report `TransportError`, which the executor
//! rewraps so callers never see a transport-native type.

use std::error::Error as StdError;
use std::fmt;

use crate::http::Method;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Broad classification of a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not resolve or connect to the host.
    Connect,
    Timeout,
    /// The peer sent something that is not valid HTTP.
    Protocol,
    Io,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Io => "io",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failure reported by a `Transport` implementation.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {source}")]
pub struct TransportError {
    kind: ErrorKind,
    #[source]
    source: BoxError,
}

impl TransportError {
    pub fn new(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The one error a request can fail with.
#[derive(Debug, thiserror::Error)]
#[error("{method} {url} failed ({kind})")]
pub struct RequestError {
    method: Method,
    url: String,
    kind: ErrorKind,
    #[source]
    source: BoxError,
}

impl RequestError {
    pub(crate) fn from_transport(method: Method, url: &str, err: TransportError) -> Self {
        Self {
            method,
            url: url.to_string(),
            kind: err.kind,
            source: err.source,
        }
    }

    pub(crate) fn other(method: Method, url: &str, source: impl Into<BoxError>) -> Self {
        Self {
            method,
            url: url.to_string(),
            kind: ErrorKind::Other,
            source: source.into(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_connect(&self) -> bool {
        self.kind == ErrorKind::Connect
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

/// Misuse of the API, reported immediately to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidUsageError {
    #[error("the callback cannot be absent")]
    MissingCallback,

    #[error("the worker pool has been shut down")]
    PoolShutDown,

    #[error("client has no home context; async requests are unavailable")]
    NoHomeContext,
}

/// The home context was dropped; the posted task was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("home context is closed")]
pub struct ContextClosed;

/// Failure while assembling a client or pool.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
