//! Opening transport connections for a parsed URL.
//!
//! `http` URLs get a plain TCP stream, `https` URLs a rustls session over TCP
//! whose handshake is completed before `open` returns. Ports default to 80
//! and 443 when the URL names none.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use rustls::{ClientConnection, StreamOwned};
use url::Url;

use crate::error::Error;
use crate::tls;

/// An open byte stream to the peer named by a URL.
#[derive(Debug)]
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Send TLS `close_notify` when applicable and shut the socket down.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.shutdown(Shutdown::Both),
            Connection::Tls(stream) => {
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    stream.conn.write_tls(&mut stream.sock)?;
                }
                stream.sock.shutdown(Shutdown::Both)
            }
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    Http,
    Https,
}

pub(crate) fn scheme(url: &Url) -> Result<Scheme, Error> {
    match url.scheme() {
        "http" => Ok(Scheme::Http),
        "https" => Ok(Scheme::Https),
        other => Err(Error::UnsupportedScheme(other.to_string())),
    }
}

/// `host:port` with the conventional default port filled in.
pub(crate) fn target_address(url: &Url) -> Result<String, Error> {
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => return Err(Error::MissingHost(url.to_string())),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::UnsupportedScheme(url.scheme().to_string()))?;
    Ok(format!("{host}:{port}"))
}

fn dial(url: &Url, addr: &str) -> Result<TcpStream, Error> {
    let dial_error = |source| Error::Dial {
        addr: addr.to_string(),
        source,
    };
    let addrs = url.socket_addrs(|| None).map_err(dial_error)?;
    TcpStream::connect(&addrs[..]).map_err(dial_error)
}

/// Open a connection for `url`. Ownership of the socket passes to the caller.
pub fn open(url: &Url) -> Result<Connection, Error> {
    let scheme = scheme(url)?;
    let addr = target_address(url)?;
    let tcp = dial(url, &addr)?;
    tracing::debug!(%addr, tls = scheme == Scheme::Https, "connected");

    match scheme {
        Scheme::Http => Ok(Connection::Plain(tcp)),
        Scheme::Https => {
            let name = tls::server_name(url)?;
            let session = ClientConnection::new(tls::client_config()?, name)
                .map_err(|e| Error::Tls(io::Error::other(e)))?;
            let mut stream = StreamOwned::new(session, tcp);
            while stream.conn.is_handshaking() {
                stream
                    .conn
                    .complete_io(&mut stream.sock)
                    .map_err(Error::Tls)?;
            }
            tracing::debug!(%addr, "TLS handshake complete");
            Ok(Connection::Tls(Box::new(stream)))
        }
    }
}
