//! Blocking execution of a single request.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::RequestError;
use crate::http::{Request, Response};
use crate::transport::Transport;

/// Runs one request/response exchange on the calling thread.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Blocks until the transport answers or fails. Every transport failure
    /// comes back as `RequestError` with the original cause as its source.
    pub fn execute(&self, mut request: Request) -> Result<Response, RequestError> {
        if !request.method().allows_body() && request.take_body().is_some() {
            warn!(
                "dropping body on {} {}: method does not carry an entity",
                request.method(),
                request.url()
            );
        }

        debug!(
            "{} {} ({} headers)",
            request.method(),
            request.url(),
            request.header_list().len()
        );

        match self.transport.send(&request) {
            Ok(response) => {
                debug!(
                    "{} {} -> {}",
                    request.method(),
                    request.url(),
                    response.status()
                );
                Ok(response)
            }
            Err(e) => Err(RequestError::from_transport(
                request.method(),
                request.url(),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransportError};
    use crate::http::{Body, Method};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Request>>,
        fail_with: Option<ErrorKind>,
    }

    impl Transport for Recording {
        fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.fail_with {
                Some(kind) => Err(TransportError::new(kind, "scripted failure")),
                None => Ok(Response::new(200, Vec::new(), b"ok".to_vec())),
            }
        }
    }

    #[test]
    fn passes_headers_and_body_through() {
        let transport = Arc::new(Recording::default());
        let executor = RequestExecutor::new(transport.clone());
        let req = Request::post("http://example.test/create")
            .header("X-Test", "1")
            .body(Body::text("hello"));

        let resp = executor.execute(req).unwrap();
        assert_eq!(resp.status(), 200);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method(), Method::Post);
        assert_eq!(seen[0].header_list()[0].name, "X-Test");
        assert_eq!(seen[0].body_ref().unwrap().as_bytes(), b"hello");
    }

    #[test]
    fn strips_body_from_get_and_delete() {
        let transport = Arc::new(Recording::default());
        let executor = RequestExecutor::new(transport.clone());
        executor
            .execute(Request::get("http://example.test/ok").body(Body::text("ignored")))
            .unwrap();
        executor
            .execute(Request::delete("http://example.test/ok").body(Body::text("ignored")))
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.body_ref().is_none()));
    }

    #[test]
    fn wraps_transport_failure() {
        let transport = Arc::new(Recording {
            fail_with: Some(ErrorKind::Timeout),
            ..Default::default()
        });
        let executor = RequestExecutor::new(transport);
        let err = executor
            .execute(Request::put("http://example.test/slow"))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.method(), Method::Put);
        assert_eq!(err.url(), "http://example.test/slow");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("scripted failure"));
    }
}
