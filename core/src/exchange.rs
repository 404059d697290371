//! One request/response exchange, and the single-shot executor built on it.
//!
//! # Design
//! `round_trip` is shared by the executor and the persistent client. The only
//! thing that differs between them is what a response the peer will not
//! follow with another one means: the executor opens a fresh connection per
//! call and does not care, the persistent client needs the connection to
//! survive.

use std::io::{self, BufReader, Read, Write};

use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse, ResponseBody};
use crate::transport;
use crate::wire::{self, BodyReader, ResponseHead};

/// What to make of a response after which the peer closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExchangePolicy {
    /// The connection is used once; a closing response is a normal end.
    OneShot,
    /// The connection must stay usable; a closing response is an error.
    Persistent,
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|source| Error::UrlParse {
        url: raw.to_string(),
        source,
    })
}

/// Encode `request`, echoing the bytes to `dump` when `config.debug` is set.
///
/// Runs before any connection is opened, so the dump appears even when the
/// dial fails.
pub(crate) fn prepare(
    request: &HttpRequest,
    url: &Url,
    config: &ClientConfig,
    dump: &mut dyn Write,
) -> Result<Vec<u8>, Error> {
    let encoded = wire::encode_request(request, url)?;
    if config.debug {
        if let Err(e) = dump.write_all(&encoded).and_then(|()| dump.flush()) {
            tracing::warn!(error = %e, "failed to dump request");
        }
    }
    Ok(encoded)
}

/// Write the encoded request and read back the response head. The body, if
/// any, is left unread on `stream`.
pub(crate) fn round_trip<S: Read + Write>(
    stream: &mut BufReader<S>,
    encoded: &[u8],
    request: &HttpRequest,
    url: &Url,
    config: &ClientConfig,
    policy: ExchangePolicy,
) -> Result<ResponseHead, Error> {
    let conn = stream.get_mut();
    conn.write_all(encoded).map_err(Error::Write)?;
    conn.flush().map_err(Error::Write)?;

    let head = wire::read_response_head(stream, config.max_response_headers)?;
    tracing::debug!(
        method = %request.method,
        %url,
        status = head.status,
        keep_alive = head.keep_alive,
        "response received"
    );
    if !head.keep_alive {
        match policy {
            ExchangePolicy::OneShot => {
                tracing::trace!(%url, "peer closes the connection after this response");
            }
            ExchangePolicy::Persistent => return Err(Error::PersistEof),
        }
    }
    Ok(head)
}

/// Send `request` over a connection opened for this call alone.
///
/// The returned body streams from that connection; dropping the response
/// closes it. With `config.debug` the encoded request is written to stdout.
pub fn execute(request: &HttpRequest, config: &ClientConfig) -> Result<HttpResponse, Error> {
    execute_with_dump(request, config, &mut io::stdout())
}

pub(crate) fn execute_with_dump(
    request: &HttpRequest,
    config: &ClientConfig,
    dump: &mut dyn Write,
) -> Result<HttpResponse, Error> {
    let url = parse_url(&request.url)?;
    let encoded = prepare(request, &url, config, dump)?;
    let mut stream = BufReader::new(transport::open(&url)?);
    let head = round_trip(
        &mut stream,
        &encoded,
        request,
        &url,
        config,
        ExchangePolicy::OneShot,
    )?;
    let framing = head.framing;
    let body = framing
        .has_body()
        .then(|| ResponseBody::new(BodyReader::new(stream, framing)));
    Ok(head.into_response(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use std::io::Cursor;
    use std::net::TcpListener;

    /// In-memory peer: replies with canned bytes and records what was sent.
    struct Scripted {
        reply: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Scripted {
        fn new(reply: &str) -> BufReader<Self> {
            BufReader::new(Self {
                reply: Cursor::new(reply.as_bytes().to_vec()),
                sent: Vec::new(),
            })
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn request() -> (HttpRequest, Url) {
        let req = HttpRequest::new(HttpMethod::Get, "http://example.test/ping");
        let url = parse_url(&req.url).unwrap();
        (req, url)
    }

    fn exchange(
        stream: &mut BufReader<Scripted>,
        policy: ExchangePolicy,
    ) -> Result<ResponseHead, Error> {
        let (req, url) = request();
        let config = ClientConfig::default();
        let encoded = prepare(&req, &url, &config, &mut io::sink())?;
        round_trip(stream, &encoded, &req, &url, &config, policy)
    }

    fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/dumped")
    }

    #[test]
    fn writes_request_then_reads_head() {
        let mut stream = Scripted::new("HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\npong");
        let head = exchange(&mut stream, ExchangePolicy::Persistent).unwrap();

        assert_eq!(head.status, 200);
        assert!(stream.get_ref().sent.starts_with(b"GET /ping HTTP/1.1\r\n"));

        let mut body = String::new();
        BodyReader::new(&mut stream, head.framing)
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "pong");
    }

    #[test]
    fn one_shot_tolerates_closing_response() {
        let mut stream =
            Scripted::new("HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok");
        let head = exchange(&mut stream, ExchangePolicy::OneShot).unwrap();
        assert!(!head.keep_alive);
    }

    #[test]
    fn persistent_rejects_closing_response() {
        let mut stream = Scripted::new("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n");
        let err = exchange(&mut stream, ExchangePolicy::Persistent).unwrap_err();
        assert!(matches!(err, Error::PersistEof));
    }

    #[test]
    fn silent_peer_is_connection_closed() {
        let mut stream = Scripted::new("");
        let err = exchange(&mut stream, ExchangePolicy::OneShot).unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn invalid_header_fails_before_encoding_completes() {
        let (mut req, url) = request();
        req.set_header("X-Bad", "line\nbreak");
        let mut dump = Vec::new();
        let config = ClientConfig::default().with_debug(true);
        let err = prepare(&req, &url, &config, &mut dump).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
        assert!(dump.is_empty());
    }

    #[test]
    fn prepare_dumps_only_when_debugging() {
        let (req, url) = request();
        let mut quiet = Vec::new();
        let encoded = prepare(&req, &url, &ClientConfig::default(), &mut quiet).unwrap();
        assert!(quiet.is_empty());

        let mut loud = Vec::new();
        let config = ClientConfig::default().with_debug(true);
        prepare(&req, &url, &config, &mut loud).unwrap();
        assert_eq!(loud, encoded);
    }

    #[test]
    fn debug_dump_is_written_before_dialing() {
        let req = HttpRequest::new(HttpMethod::Get, refused_url());
        let config = ClientConfig::default().with_debug(true);
        let mut dump = Vec::new();
        let err = execute_with_dump(&req, &config, &mut dump).unwrap_err();
        assert!(matches!(err, Error::Dial { .. }));
        assert!(dump.starts_with(b"GET /dumped HTTP/1.1\r\n"));
    }

    #[test]
    fn execute_rejects_malformed_url() {
        let req = HttpRequest::new(HttpMethod::Get, "http://[::1");
        let err = execute(&req, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UrlParse { .. }));
    }

    #[test]
    fn execute_rejects_unsupported_scheme() {
        let req = HttpRequest::new(HttpMethod::Get, "ftp://example.test/file");
        let err = execute(&req, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(_)));
    }
}
