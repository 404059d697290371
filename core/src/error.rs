//! Error type for every fallible operation in the crate.
//!
//! # Design
//! Variants follow where a failure happened rather than what the transport
//! reported: parsing the URL, dialing, negotiating TLS, writing the request,
//! reading the response, draining the body. Underlying `io::Error` values are
//! passed through untouched as the `source`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the request builder, the single-shot executor and the
/// persistent [`Client`](crate::Client).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The raw URL string could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    UrlParse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Only `http` and `https` are supported.
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    /// The URL parsed but names no host to connect to.
    #[error("URL '{0}' has no host")]
    MissingHost(String),

    /// TCP connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// TLS negotiation or certificate hostname verification failed.
    #[error("TLS error: {0}")]
    Tls(#[source] io::Error),

    /// A header name or value cannot be put on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Writing the request to the connection failed.
    #[error("failed to write request: {0}")]
    Write(#[source] io::Error),

    /// Reading the response from the connection failed.
    #[error("failed to read response: {0}")]
    Read(#[source] io::Error),

    /// The peer sent bytes that are not an HTTP/1.x response.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The peer closed the connection before sending a response.
    #[error("connection closed before a response was received")]
    ConnectionClosed,

    /// The response was complete but the peer will not keep the connection
    /// open for another exchange.
    #[error("connection will not persist beyond this response")]
    PersistEof,

    /// Draining the response body failed.
    #[error("failed to read response body: {0}")]
    Body(#[source] io::Error),

    /// The destination file for a response body could not be opened or
    /// written.
    #[error("file error on '{}': {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
