//! Persistent single-connection HTTP client.
//!
//! # Design
//! `Client` caches exactly one connection together with the origin (scheme,
//! host, port) it was opened for. A request to the same origin reuses it; a
//! request anywhere else closes it and opens a new one. Response bodies are
//! read to the end before `request` returns so the connection is ready for
//! the next exchange.
//!
//! Any failure drops the cached connection, so the next call starts from a
//! fresh one rather than writing into a stream in an unknown state.

use std::fmt;
use std::io::{self, BufReader, Read};

use url::{Origin, Url};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::exchange::{self, ExchangePolicy};
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse, ResponseBody};
use crate::transport::{self, Connection};
use crate::wire::BodyReader;

struct Cached {
    origin: Origin,
    stream: BufReader<Connection>,
}

impl Cached {
    fn close(mut self) {
        if let Err(e) = self.stream.get_mut().close() {
            tracing::trace!(error = %e, "error closing connection");
        }
    }
}

/// Reusable client holding at most one open connection.
#[derive(Default)]
pub struct Client {
    config: ClientConfig,
    cached: Option<Cached>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("cached_origin", &self.cached_origin())
            .finish()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Origin of the cached connection, e.g. `http://127.0.0.1:3000`.
    pub fn cached_origin(&self) -> Option<String> {
        self.cached
            .as_ref()
            .map(|cached| cached.origin.ascii_serialization())
    }

    /// Close and forget the cached connection, if any.
    pub fn close(&mut self) {
        if let Some(cached) = self.cached.take() {
            cached.close();
        }
    }

    /// Send one request over the cached connection.
    ///
    /// `headers` may carry a `User-Agent` entry, which takes precedence over
    /// the configured one.
    pub fn request(
        &mut self,
        raw_url: &str,
        method: HttpMethod,
        headers: &[(&str, &str)],
        body: Option<Body>,
    ) -> Result<HttpResponse, Error> {
        let mut request = HttpRequest::new(method, raw_url);
        request.user_agent = self.config.user_agent.clone();
        for (name, value) in headers {
            request.set_header(*name, *value);
        }
        request.body = body;
        self.send(&request)
    }

    /// Send a prepared request over the cached connection.
    ///
    /// With debugging enabled the encoded request is written to stdout
    /// before any connection is opened or reused.
    pub fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let url = exchange::parse_url(&request.url)?;
        let encoded = exchange::prepare(request, &url, &self.config, &mut io::stdout())?;
        let stream = connect(&mut self.cached, &url)?;
        let result = exchange_buffered(stream, &encoded, request, &url, &self.config);
        if result.is_err() {
            self.cached = None;
        }
        result
    }
}

/// Reuse the cached connection when it serves `url`'s origin, otherwise
/// close it and open a new one in its place.
fn connect<'a>(
    slot: &'a mut Option<Cached>,
    url: &Url,
) -> Result<&'a mut BufReader<Connection>, Error> {
    let origin = url.origin();
    let cached = match slot.take() {
        Some(cached) if cached.origin == origin => {
            tracing::debug!(origin = %origin.ascii_serialization(), "reusing connection");
            cached
        }
        stale => {
            if let Some(stale) = stale {
                tracing::debug!(
                    from = %stale.origin.ascii_serialization(),
                    to = %origin.ascii_serialization(),
                    "replacing connection"
                );
                stale.close();
            }
            Cached {
                stream: BufReader::new(transport::open(url)?),
                origin,
            }
        }
    };
    Ok(&mut slot.insert(cached).stream)
}

fn exchange_buffered(
    stream: &mut BufReader<Connection>,
    encoded: &[u8],
    request: &HttpRequest,
    url: &Url,
    config: &ClientConfig,
) -> Result<HttpResponse, Error> {
    let head = exchange::round_trip(
        stream,
        encoded,
        request,
        url,
        config,
        ExchangePolicy::Persistent,
    )?;
    let body = if head.framing.has_body() {
        let mut buf = Vec::new();
        BodyReader::new(&mut *stream, head.framing)
            .read_to_end(&mut buf)
            .map_err(Error::Read)?;
        Some(ResponseBody::buffered(buf))
    } else {
        None
    };
    Ok(head.into_response(body))
}
