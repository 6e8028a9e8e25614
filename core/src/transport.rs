//! The transport seam and its default ureq implementation.
//!
//! # Design
//! The executor depends only on the narrow `Transport` contract: one
//! blocking exchange per call, returning a `Response` for any status code or
//! a `TransportError` when no response could be obtained. Anything else a
//! transport does (sockets, TLS, pooling, parsing) stays behind this trait,
//! which also lets tests substitute a scripted transport.

use std::io;
use std::time::Duration;

use crate::config::{ClientConfig, DEFAULT_MAX_BODY_BYTES};
use crate::error::{ErrorKind, TransportError};
use crate::http::{Header, Method, Request, Response};

/// Performs one blocking request/response exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Blocking transport backed by a `ureq::Agent`.
///
/// HTTP status codes are never turned into errors: a 404 or 500 is a
/// completed exchange and comes back as a `Response`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: Option<String>,
    max_body_bytes: Option<u64>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout_secs.map(Duration::from_secs))
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Wrap an agent configured elsewhere. The agent should have
    /// `http_status_as_error(false)` or error statuses surface as failures.
    /// Bodies are capped at `DEFAULT_MAX_BODY_BYTES`.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            user_agent: None,
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES),
        }
    }

    fn apply_headers<B>(
        &self,
        mut builder: ureq::RequestBuilder<B>,
        request: &Request,
    ) -> ureq::RequestBuilder<B> {
        if let Some(ua) = &self.user_agent {
            builder = builder.header("User-Agent", ua.as_str());
        }
        for h in request.header_list() {
            builder = builder.header(h.name.as_str(), h.value.as_str());
        }
        let has_content_type = request
            .header_list()
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("content-type"));
        if let Some(ct) = request.body_ref().and_then(|b| b.content_type()) {
            if !has_content_type {
                builder = builder.header("Content-Type", ct);
            }
        }
        builder
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = request.url();
        let result = match request.method() {
            Method::Get => self.apply_headers(self.agent.get(url), request).call(),
            Method::Delete => self.apply_headers(self.agent.delete(url), request).call(),
            Method::Post => {
                let builder = self.apply_headers(self.agent.post(url), request);
                match request.body_ref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            Method::Put => {
                let builder = self.apply_headers(self.agent.put(url), request);
                match request.body_ref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(into_transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                Header::new(
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // ureq caps bodies at 10 MiB unless told otherwise.
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes.unwrap_or(u64::MAX))
            .read_to_vec()
            .map_err(into_transport_error)?;

        Ok(Response::new(status, headers, body))
    }
}

fn into_transport_error(err: ureq::Error) -> TransportError {
    let kind = classify(&err);
    TransportError::new(kind, err)
}

fn classify(err: &ureq::Error) -> ErrorKind {
    match err {
        ureq::Error::Timeout(_) => ErrorKind::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => ErrorKind::Connect,
        ureq::Error::Io(e) => classify_io(e),
        ureq::Error::Protocol(_) => ErrorKind::Protocol,
        _ => ErrorKind::Other,
    }
}

fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => ErrorKind::Connect,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_and_reset_count_as_connect_failures() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_io(&refused), ErrorKind::Connect);
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_io(&reset), ErrorKind::Connect);
    }

    #[test]
    fn io_timeouts_are_timeouts() {
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_io(&timed_out), ErrorKind::Timeout);
    }

    #[test]
    fn other_io_errors_stay_io() {
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert_eq!(classify_io(&eof), ErrorKind::Io);
    }

    #[test]
    fn refused_connection_surfaces_as_transport_error() {
        // Bind then drop so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = UreqTransport::new();
        let err = transport
            .send(&Request::get(format!("http://127.0.0.1:{port}/")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connect);
    }
}
