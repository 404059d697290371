//! HTTP/1.1 message framing.
//!
//! # Design
//! Requests are encoded into a single buffer and written in one go; the same
//! bytes back the debug dump. Response heads are read line by line up to the
//! blank line and parsed with `httparse`. The body is left on the reader and
//! exposed through [`BodyReader`], which enforces `Content-Length`, chunked or
//! read-until-close framing.

use std::io::{self, BufRead, Read};

use url::{Position, Url};

use crate::error::Error;
use crate::http::{find, HttpRequest, HttpResponse, ResponseBody};

/// Upper bound on the bytes of a response head, status line included.
const MAX_HEAD_BYTES: u64 = 64 * 1024;

/// Upper bound on a chunk-size or trailer line.
const MAX_LINE_BYTES: u64 = 4 * 1024;

/// Headers the encoder writes itself; caller entries with these names are
/// not sent.
const MANAGED_HEADERS: [&str; 3] = ["host", "user-agent", "content-length"];

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &str) -> Result<(), Error> {
    if !is_token(name) {
        return Err(Error::InvalidHeader(format!("invalid header name {name:?}")));
    }
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(Error::InvalidHeader(format!(
            "value of {name} contains a line break or NUL"
        )));
    }
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
    Ok(())
}

/// `Host` header value: the URL host, with the port only when it is not
/// the scheme's default.
fn host_header(url: &Url) -> Result<String, Error> {
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| Error::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Serialize `request` for `url` into HTTP/1.1 wire bytes.
pub fn encode_request(request: &HttpRequest, url: &Url) -> Result<Vec<u8>, Error> {
    let target = &url[Position::BeforePath..Position::AfterQuery];
    let target = if target.is_empty() { "/" } else { target };

    let body = request.body.as_ref().map(|body| body.as_bytes());
    let mut out = Vec::with_capacity(256 + body.map_or(0, <[u8]>::len));
    out.extend_from_slice(request.method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(target.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");

    push_header(&mut out, "Host", &host_header(url)?)?;
    push_header(&mut out, "User-Agent", request.effective_user_agent())?;
    for (name, value) in &request.headers {
        if MANAGED_HEADERS
            .iter()
            .any(|managed| name.eq_ignore_ascii_case(managed))
        {
            continue;
        }
        push_header(&mut out, name, value)?;
    }
    if let Some(body) = body {
        push_header(&mut out, "Content-Length", &body.len().to_string())?;
    }
    out.extend_from_slice(b"\r\n");
    if let Some(body) = body {
        out.extend_from_slice(body);
    }
    Ok(out)
}

/// The encoded form of `request`, as written to the wire.
pub fn dump_request(request: &HttpRequest) -> Result<Vec<u8>, Error> {
    let url = Url::parse(&request.url).map_err(|source| Error::UrlParse {
        url: request.url.clone(),
        source,
    })?;
    encode_request(request, &url)
}

/// How the response body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl Framing {
    pub(crate) fn has_body(self) -> bool {
        self != Framing::Empty
    }
}

/// Status line and headers of a response; the body is still on the reader.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub(crate) status: u16,
    pub(crate) reason: String,
    pub(crate) version: u8,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) framing: Framing,
    pub(crate) keep_alive: bool,
}

impl ResponseHead {
    pub(crate) fn into_response(self, body: Option<ResponseBody>) -> HttpResponse {
        HttpResponse {
            status: self.status,
            reason: self.reason,
            version: self.version,
            headers: self.headers,
            body,
            keep_alive: self.keep_alive,
        }
    }
}

fn has_token(headers: &[(String, String)], name: &str, token: &str) -> bool {
    headers
        .iter()
        .filter(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .flat_map(|(_, value)| value.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

fn framing(status: u16, headers: &[(String, String)]) -> Result<Framing, Error> {
    if (100..200).contains(&status) || status == 204 || status == 304 {
        return Ok(Framing::Empty);
    }

    if let Some(encoding) = find(headers, "Transfer-Encoding") {
        let last = encoding.rsplit(',').next().unwrap_or("").trim();
        if last.eq_ignore_ascii_case("chunked") {
            return Ok(Framing::Chunked);
        }
        return Ok(Framing::UntilClose);
    }

    let mut length = None;
    for (_, value) in headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
    {
        for part in value.split(',') {
            let parsed: u64 = part.trim().parse().map_err(|_| {
                Error::MalformedResponse(format!("invalid Content-Length {value:?}"))
            })?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(Error::MalformedResponse(
                        "conflicting Content-Length values".to_string(),
                    ));
                }
                _ => length = Some(parsed),
            }
        }
    }

    Ok(match length {
        Some(0) => Framing::Empty,
        Some(n) => Framing::Length(n),
        None => Framing::UntilClose,
    })
}

/// Read raw head bytes up to and including the blank line.
fn read_head_bytes<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let mut raw = Vec::new();
    loop {
        let start = raw.len();
        let budget = MAX_HEAD_BYTES.saturating_sub(start as u64);
        if budget == 0 {
            return Err(Error::MalformedResponse("response head too large".to_string()));
        }
        let n = (&mut *reader)
            .take(budget)
            .read_until(b'\n', &mut raw)
            .map_err(Error::Read)?;
        if n == 0 {
            return Err(if raw.is_empty() {
                Error::ConnectionClosed
            } else {
                Error::MalformedResponse("connection closed inside response head".to_string())
            });
        }
        let line = &raw[start..];
        if !line.ends_with(b"\n") {
            continue;
        }
        if line == b"\r\n" || line == b"\n" {
            if start == 0 {
                // Stray line breaks left over from a previous message.
                raw.clear();
                continue;
            }
            return Ok(raw);
        }
    }
}

/// Read one response head, skipping interim 1xx responses other than 101.
pub(crate) fn read_response_head<R: BufRead>(
    reader: &mut R,
    max_headers: usize,
) -> Result<ResponseHead, Error> {
    loop {
        let raw = read_head_bytes(reader)?;
        let mut slots = vec![httparse::EMPTY_HEADER; max_headers];
        let mut parsed = httparse::Response::new(&mut slots);
        match parsed.parse(&raw) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(Error::MalformedResponse("incomplete response head".to_string()));
            }
            Err(e) => return Err(Error::MalformedResponse(e.to_string())),
        }

        let status = parsed.code.unwrap_or_default();
        let version = parsed.version.unwrap_or(1);
        if (100..200).contains(&status) && status != 101 {
            tracing::trace!(status, "skipping interim response");
            continue;
        }

        let headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();
        let framing = framing(status, &headers)?;
        let keep_alive = framing != Framing::UntilClose
            && if version >= 1 {
                !has_token(&headers, "Connection", "close")
            } else {
                has_token(&headers, "Connection", "keep-alive")
            };
        tracing::trace!(status, ?framing, keep_alive, "parsed response head");

        return Ok(ResponseHead {
            status,
            reason: parsed.reason.unwrap_or_default().to_string(),
            version,
            headers,
            framing,
            keep_alive,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Length(u64),
    ChunkSize,
    Chunk(u64),
    UntilClose,
    Done,
}

/// `Read` adapter yielding exactly one response body from `reader`.
pub(crate) struct BodyReader<R> {
    reader: R,
    state: BodyState,
}

impl<R: BufRead> BodyReader<R> {
    pub(crate) fn new(reader: R, framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty | Framing::Length(0) => BodyState::Done,
            Framing::Length(n) => BodyState::Length(n),
            Framing::Chunked => BodyState::ChunkSize,
            Framing::UntilClose => BodyState::UntilClose,
        };
        Self { reader, state }
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        (&mut self.reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut line)?;
        Ok(line)
    }

    fn read_chunk_size(&mut self) -> io::Result<u64> {
        let line = self.read_line()?;
        if line.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "body ended before the last chunk",
            ));
        }
        let text = std::str::from_utf8(&line).map_err(|e| invalid(e.to_string()))?;
        let size = text.split(';').next().unwrap_or("").trim();
        u64::from_str_radix(size, 16).map_err(|_| invalid(format!("invalid chunk size {size:?}")))
    }

    fn read_chunk_end(&mut self) -> io::Result<()> {
        match self.read_line()?.as_slice() {
            b"\r\n" | b"\n" => Ok(()),
            [] => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "body ended inside a chunk",
            )),
            _ => Err(invalid("chunk not followed by CRLF".to_string())),
        }
    }

    fn skip_trailers(&mut self) -> io::Result<()> {
        loop {
            let line = self.read_line()?;
            if line.is_empty() || line == b"\r\n" || line == b"\n" {
                return Ok(());
            }
        }
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn clamp(len: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(len, |remaining| len.min(remaining))
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                BodyState::Done => return Ok(0),
                BodyState::UntilClose => {
                    let n = self.reader.read(buf)?;
                    if n == 0 {
                        self.state = BodyState::Done;
                    }
                    return Ok(n);
                }
                BodyState::Length(remaining) => {
                    let max = clamp(buf.len(), remaining);
                    let n = self.reader.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "body shorter than Content-Length",
                        ));
                    }
                    let remaining = remaining - n as u64;
                    self.state = if remaining == 0 {
                        BodyState::Done
                    } else {
                        BodyState::Length(remaining)
                    };
                    return Ok(n);
                }
                BodyState::ChunkSize => {
                    let size = self.read_chunk_size()?;
                    if size == 0 {
                        self.skip_trailers()?;
                        self.state = BodyState::Done;
                    } else {
                        self.state = BodyState::Chunk(size);
                    }
                }
                BodyState::Chunk(remaining) => {
                    let max = clamp(buf.len(), remaining);
                    let n = self.reader.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "body ended inside a chunk",
                        ));
                    }
                    let remaining = remaining - n as u64;
                    if remaining == 0 {
                        self.read_chunk_end()?;
                        self.state = BodyState::ChunkSize;
                    } else {
                        self.state = BodyState::Chunk(remaining);
                    }
                    return Ok(n);
                }
            }
        }
    }
}
