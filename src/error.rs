//! Error types for the proxy.

use std::io;
use thiserror::Error;

use crate::http::parser::ParseError;

/// Errors raised while handling a single client connection.
///
/// None of these are fatal to the process: the listener logs them and the
/// affected connection is closed.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("upstream {addr} unreachable: {source}")]
    UpstreamUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed request: {0}")]
    MalformedRequest(ParseError),

    #[error("malformed upgrade: {0}")]
    MalformedUpgrade(String),

    #[error("invalid upstream response: {0}")]
    InvalidUpstreamResponse(ParseError),

    #[error("upstream closed connection before responding")]
    UpstreamClosed,

    #[error("client closed connection mid-request")]
    ClientClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Whether the failure happened before any response bytes reached the
    /// client, so a `502 Bad Gateway` can still be written.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamUnreachable { .. }
                | ProxyError::InvalidUpstreamResponse(_)
                | ProxyError::UpstreamClosed
        )
    }
}

/// Errors raised while resolving the startup configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid TARGET_BASE_URL {value:?}: {source}")]
    InvalidTargetUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("TARGET_BASE_URL {0:?} has no host")]
    MissingHost(String),

    #[error("TARGET_BASE_URL {0:?} has no port and no known default for its scheme")]
    MissingPort(String),

    #[error("invalid PROXY_PORT {0:?}")]
    InvalidPort(String),
}
