use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, pattern, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::USER_AGENT, "api-test")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_method_path_and_query() {
    let resp = app()
        .oneshot(request("GET", "/echo?q=a%20b&page=2", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.query.as_deref(), Some("q=a%20b&page=2"));
    assert_eq!(echo.headers["user-agent"], "api-test");
    assert!(echo.body.is_empty());
}

#[tokio::test]
async fn echo_reports_body() {
    let resp = app()
        .oneshot(request("POST", "/echo", "name=value"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "name=value");
}

#[tokio::test]
async fn echo_accepts_nested_paths_and_any_method() {
    for method in ["PUT", "DELETE"] {
        let resp = app()
            .oneshot(request(method, "/echo/users/7", ""))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let echo: Echo = body_json(resp).await;
        assert_eq!(echo.method, method);
        assert_eq!(echo.path, "/echo/users/7");
    }
}

#[tokio::test]
async fn echo_without_connect_info_has_no_peer() {
    let resp = app().oneshot(request("GET", "/echo", "")).await.unwrap();
    let echo: Echo = body_json(resp).await;
    assert!(echo.peer.is_none());
}

// --- raw ---

#[tokio::test]
async fn raw_returns_body_verbatim() {
    let resp = app()
        .oneshot(request("POST", "/raw", "hello"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(body_bytes(resp).await.as_ref(), b"hello");
}

// --- bytes ---

#[tokio::test]
async fn bytes_returns_pattern() {
    let resp = app()
        .oneshot(request("GET", "/bytes/1000", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.as_ref(), pattern(1000).as_slice());
}

#[tokio::test]
async fn bytes_rejects_non_numeric_length() {
    let resp = app()
        .oneshot(request("GET", "/bytes/lots", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code() {
    let resp = app()
        .oneshot(request("GET", "/status/204", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_out_of_range_is_bad_request() {
    let resp = app()
        .oneshot(request("GET", "/status/42", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- close ---

#[tokio::test]
async fn close_sets_connection_header() {
    let resp = app().oneshot(request("GET", "/close", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONNECTION], "close");
    assert_eq!(body_bytes(resp).await.as_ref(), b"closing");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let resp = app()
        .oneshot(request("GET", "/nowhere", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
