use std::{collections::BTreeMap, net::SocketAddr};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Largest request body the echo handlers will buffer.
const MAX_BODY: usize = 16 * 1024 * 1024;

/// What the server saw for a single request, returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Client socket address, present when served with connect info.
    pub peer: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/raw", any(raw))
        .route("/bytes/{n}", get(bytes))
        .route("/status/{code}", get(status))
        .route("/close", get(close))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(
        listener,
        app().into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn echo(request: Request) -> Result<Json<Echo>, StatusCode> {
    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let body = axum::body::to_bytes(body, MAX_BODY)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Ok(Json(Echo {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
        peer,
    }))
}

async fn raw(body: Bytes) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], body)
}

async fn bytes(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_BODY {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(pattern(n))
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn close() -> impl IntoResponse {
    ([(header::CONNECTION, "close")], "closing")
}

/// The deterministic payload served by `/bytes/{n}`.
pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}
