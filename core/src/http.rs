//! HTTP request and response types.
//!
//! # Design
//! `HttpRequest` is plain data: the builder and the persistent client fill it
//! in, and nothing touches the network until it is handed to the executor.
//! `HttpResponse` owns its body as a reader so large responses can be
//! streamed straight from the connection; the `text`/`bytes`/`copy_to`
//! helpers drain it.
//!
//! Headers are kept as `(name, value)` pairs in insertion order. Names are
//! unique under ASCII case-insensitive comparison.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_USER_AGENT;
use crate::error::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a method token other than GET/POST/PUT/DELETE.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

/// Request body content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

/// An HTTP request described as plain data.
///
/// `url` stays a raw string until the request is sent; parse failures are
/// reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub body: Option<Body>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            body: None,
        }
    }

    /// Insert or replace a header. Replacing keeps the original position.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        upsert(&mut self.headers, name.into(), value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find(&self.headers, name)
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = Some(body.into());
    }

    /// Length sent as `Content-Length`, if the request has a body.
    pub fn content_length(&self) -> Option<usize> {
        self.body.as_ref().map(Body::len)
    }

    /// The `User-Agent` header entry if present, else `user_agent`.
    pub fn effective_user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or(&self.user_agent)
    }
}

pub(crate) fn upsert(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
    {
        Some((_, slot)) => *slot = value,
        None => headers.push((name, value)),
    }
}

pub(crate) fn find<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Readable response body.
///
/// Either streams from the connection that carried the response or replays
/// bytes already buffered by the persistent client.
pub struct ResponseBody {
    inner: Box<dyn Read + Send>,
}

impl ResponseBody {
    pub(crate) fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    pub(crate) fn buffered(bytes: Vec<u8>) -> Self {
        Self::new(io::Cursor::new(bytes))
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

/// An HTTP response read from the wire.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    /// HTTP minor version: `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub version: u8,
    pub headers: Vec<(String, String)>,
    /// `None` when the framing carries no body (1xx, 204, 304,
    /// `Content-Length: 0`).
    pub body: Option<ResponseBody>,
    /// Whether the peer allows another exchange on the same connection.
    pub keep_alive: bool,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find(&self.headers, name)
    }

    /// Drain the body as UTF-8 text. No body yields an empty string.
    pub fn text(self) -> Result<String, Error> {
        let mut text = String::new();
        if let Some(mut body) = self.body {
            body.read_to_string(&mut text).map_err(Error::Body)?;
        }
        Ok(text)
    }

    /// Drain the body into a buffer. No body yields an empty buffer.
    pub fn bytes(self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        if let Some(mut body) = self.body {
            body.read_to_end(&mut bytes).map_err(Error::Body)?;
        }
        Ok(bytes)
    }

    /// Copy the whole body into `writer`, returning the number of bytes
    /// copied.
    pub fn copy_to<W: Write + ?Sized>(self, writer: &mut W) -> Result<u64, Error> {
        match self.body {
            Some(mut body) => io::copy(&mut body, writer).map_err(Error::Body),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: Option<&[u8]>) -> HttpResponse {
        HttpResponse {
            status: 200,
            reason: "OK".to_string(),
            version: 1,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.map(|b| ResponseBody::buffered(b.to_vec())),
            keep_alive: true,
        }
    }

    #[test]
    fn method_tokens() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!("PUT".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert_eq!(
            "patch".parse::<HttpMethod>().unwrap_err(),
            UnknownMethod("patch".to_string())
        );
        assert_eq!(
            UnknownMethod("patch".to_string()).to_string(),
            "unknown HTTP method: patch"
        );
    }

    #[test]
    fn body_lengths_count_bytes() {
        assert_eq!(Body::from("héllo").len(), 6);
        assert_eq!(Body::from(vec![0u8, 1, 2]).len(), 3);
        assert!(Body::from("").is_empty());
        assert_eq!(Body::from(&b"ab"[..]).as_bytes(), b"ab");
    }

    #[test]
    fn new_request_uses_default_user_agent() {
        let req = HttpRequest::new(HttpMethod::Get, "http://example.test/");
        assert_eq!(req.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(req.effective_user_agent(), DEFAULT_USER_AGENT);
        assert!(req.headers.is_empty());
        assert!(req.content_length().is_none());
    }

    #[test]
    fn set_header_is_case_insensitive_upsert() {
        let mut req = HttpRequest::new(HttpMethod::Get, "http://example.test/");
        req.set_header("Accept", "text/html");
        req.set_header("X-Trace", "1");
        req.set_header("accept", "application/json");
        req.set_header("accept", "application/json");
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(req.header("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn user_agent_header_overrides_field() {
        let mut req = HttpRequest::new(HttpMethod::Get, "http://example.test/");
        req.set_header("user-agent", "custom/1");
        assert_eq!(req.effective_user_agent(), "custom/1");
    }

    #[test]
    fn set_body_sets_content_length() {
        let mut req = HttpRequest::new(HttpMethod::Post, "http://example.test/");
        req.set_body("hello");
        assert_eq!(req.content_length(), Some(5));
    }

    #[test]
    fn response_text_and_missing_body() {
        assert_eq!(response(Some(&b"hi"[..])).text().unwrap(), "hi");
        assert_eq!(response(None).text().unwrap(), "");
        assert!(response(None).bytes().unwrap().is_empty());
    }

    #[test]
    fn response_text_rejects_invalid_utf8() {
        let err = response(Some(&[0xffu8, 0xfe][..])).text().unwrap_err();
        assert!(matches!(err, Error::Body(_)));
    }

    #[test]
    fn response_copy_to_writes_everything() {
        let mut out = Vec::new();
        let copied = response(Some(&b"payload"[..])).copy_to(&mut out).unwrap();
        assert_eq!(copied, 7);
        assert_eq!(out, b"payload");
        assert_eq!(response(None).copy_to(&mut out).unwrap(), 0);
    }

    #[test]
    fn response_header_lookup() {
        let resp = response(None);
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.header("content-length"), None);
    }
}
