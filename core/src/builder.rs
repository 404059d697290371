//! Fluent request builder.
//!
//! # Design
//! A builder owns a pending [`HttpRequest`] plus a separate parameter map.
//! Chained calls take and return the builder by value. `build` performs the
//! finalization step (parameters into the query string for GET, into a
//! form-encoded body for POST) without any I/O, and each terminal method
//! consumes the builder, runs `build`, and sends the result through the
//! single-shot executor.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::exchange;
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Percent-encode and join parameters as `k=v&k=v`, in key order.
fn encode_params(params: &BTreeMap<String, String>) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let encoded = params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    Some(encoded)
}

fn file_error(path: &Path, source: io::Error) -> Error {
    Error::File {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy the response body into `writer`. Read failures are body errors,
/// write failures are file errors on `path`.
fn write_body<W: Write>(response: HttpResponse, writer: &mut W, path: &Path) -> Result<u64, Error> {
    let Some(mut body) = response.body else {
        return Ok(0);
    };
    let mut buf = [0u8; 8 * 1024];
    let mut copied = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Body(e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|source| file_error(path, source))?;
        copied += n as u64;
    }
    writer.flush().map_err(|source| file_error(path, source))?;
    Ok(copied)
}

/// Single-use builder for one HTTP exchange.
#[must_use = "RequestBuilder does nothing until a terminal method is called"]
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: HttpRequest,
    params: BTreeMap<String, String>,
    config: ClientConfig,
}

impl RequestBuilder {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            request: HttpRequest::new(method, url),
            params: BTreeMap::new(),
            config: ClientConfig::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Replace the configuration, including the default User-Agent.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.request.user_agent = config.user_agent.clone();
        self.config = config;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.set_header(key, value);
        self
    }

    /// Add a query (GET) or form (POST) parameter. Last write wins.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set an explicit body. On POST this suppresses the form body built
    /// from parameters.
    pub fn body(mut self, data: impl Into<Body>) -> Self {
        self.request.set_body(data);
        self
    }

    /// The request the terminal methods would send.
    pub fn build(&self) -> HttpRequest {
        let mut request = self.request.clone();
        let Some(encoded) = encode_params(&self.params) else {
            return request;
        };

        match request.method {
            HttpMethod::Get => {
                let separator = if request.url.contains('?') { '&' } else { '?' };
                request.url.push(separator);
                request.url.push_str(&encoded);
            }
            HttpMethod::Post if request.body.is_none() => {
                if request.header("Content-Type").is_none() {
                    request.set_header("Content-Type", FORM_CONTENT_TYPE);
                }
                request.set_body(encoded);
            }
            _ => {}
        }
        request
    }

    /// Send the request and return the response untouched.
    pub fn as_response(self) -> Result<HttpResponse, Error> {
        let request = self.build();
        exchange::execute(&request, &self.config)
    }

    /// Send the request and read the body as UTF-8 text.
    pub fn as_string(self) -> Result<String, Error> {
        self.as_response()?.text()
    }

    /// Send the request and read the body into a buffer.
    pub fn as_bytes(self) -> Result<Vec<u8>, Error> {
        self.as_response()?.bytes()
    }

    /// Send the request and write the body to `path`.
    ///
    /// The file is created (or truncated) before the request is sent. A
    /// failure while copying leaves whatever was written so far; failures on
    /// the file side are reported as [`Error::File`].
    pub fn as_file(self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|source| file_error(path, source))?;
        let copied = write_body(self.as_response()?, &mut file, path)?;
        tracing::debug!(path = %path.display(), bytes = copied, "response written to file");
        Ok(())
    }
}
