//! HTTP endpoints the client tests run against.
//!
//! Every route is stateless: each one reflects or shapes the response from
//! what is in the request path or the request itself.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Largest body `/bytes/{n}` will produce.
pub const MAX_GENERATED_BYTES: usize = 64 * 1024 * 1024;

/// What `/echo` saw: method, headers in arrival order, body as text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// Values of every header named `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{ms}", get(slow))
        .route("/bytes/{n}", get(bytes))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn ok() -> &'static str {
    "ok"
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.as_str().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {ms}ms")
}

/// A body of exactly `n` bytes, all `b'x'`.
async fn bytes(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_GENERATED_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok(vec![b'x'; n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_header_lookup_ignores_case_and_keeps_duplicates() {
        let echo = Echo {
            method: "GET".to_string(),
            headers: vec![
                ("x-test".to_string(), "1".to_string()),
                ("accept".to_string(), "*/*".to_string()),
                ("X-Test".to_string(), "2".to_string()),
            ],
            body: String::new(),
        };
        assert_eq!(echo.header_values("X-TEST"), vec!["1", "2"]);
        assert!(echo.header_values("missing").is_empty());
    }
}
