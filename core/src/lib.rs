//! Small blocking HTTP/1.1 client.
//!
//! # Overview
//! Two ways to send a request:
//! - the fluent [`RequestBuilder`], started with [`get`], [`post`], [`put`]
//!   or [`delete`], which opens a fresh connection for each request and
//!   reads the response as a string, bytes, a file, or the raw response;
//! - the persistent [`Client`], which keeps one connection open and reuses
//!   it while requests target the same origin.
//!
//! ```no_run
//! let body = httplib::get("http://example.com/search")
//!     .param("q", "a b")
//!     .as_string()?;
//! # Ok::<(), httplib::Error>(())
//! ```
//!
//! # Design
//! - Requests are plain data ([`HttpRequest`]) until handed to the executor.
//! - `https` uses rustls with the operating system's root certificates.
//! - All I/O blocks the calling thread; there are no timeouts or retries.
//! - Logging goes through `tracing`; install a subscriber to see it.
//!   [`ClientConfig::debug`] additionally dumps each request to stdout.

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
mod tls;
pub mod transport;
pub mod wire;

pub use builder::RequestBuilder;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_USER_AGENT};
pub use error::Error;
pub use exchange::execute;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse, ResponseBody};

pub fn get(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::get(url)
}

pub fn post(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::post(url)
}

pub fn put(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::put(url)
}

pub fn delete(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::delete(url)
}
