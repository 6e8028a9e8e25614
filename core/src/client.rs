//! The caller-facing client: header accumulation plus sync and async verbs.
//!
//! # Design
//! `HttpClient` keeps an ordered list of pending headers, added with
//! `add_header`. When any verb method begins, the list is moved out into an
//! immutable `Request`, so it is empty as soon as the call returns (or, for
//! async verbs, as soon as the request is queued) and a later call can never
//! see or alter an earlier call's headers. An async call the dispatcher
//! refuses puts the headers back.
//!
//! Synchronous verbs run the `RequestExecutor` inline. Asynchronous verbs hand
//! a thunk to the `AsyncDispatcher`, which delivers the outcome on the home
//! context the client was built with.

use std::mem;
use std::sync::Arc;

use crate::callback::Callback;
use crate::config::ClientConfig;
use crate::dispatcher::{AsyncDispatcher, Target};
use crate::error::{BuildError, InvalidUsageError, RequestError};
use crate::executor::RequestExecutor;
use crate::home::HomeHandle;
use crate::http::{Body, Header, Method, Request, Response};
use crate::pool::WorkerPool;
use crate::transport::{Transport, UreqTransport};

/// Blocking HTTP verbs plus their callback-based async counterparts.
///
/// Headers added with `add_header` apply to the next request only. Async
/// verbs need a client built with a home handle; their callbacks run when
/// that home context is drained.
pub struct HttpClient {
    executor: RequestExecutor,
    dispatcher: Option<AsyncDispatcher>,
    /// Shut down by `HttpClient::shutdown` only when the client built it.
    owns_pool: bool,
    headers: Vec<Header>,
}

impl HttpClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// A synchronous-only client over the default transport.
    pub fn new() -> Self {
        Self {
            executor: RequestExecutor::new(Arc::new(UreqTransport::new())),
            dispatcher: None,
            owns_pool: false,
            headers: Vec::new(),
        }
    }

    /// Queue a header for the next request. Cleared once that request starts.
    pub fn add_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn add(&mut self, header: Header) -> &mut Self {
        self.headers.push(header);
        self
    }

    /// Headers that the next request will carry.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn dispatcher(&self) -> Option<&AsyncDispatcher> {
        self.dispatcher.as_ref()
    }

    fn take_request(&mut self, method: Method, url: &str, body: Option<Body>) -> Request {
        Request::new(method, url)
            .headers(mem::take(&mut self.headers))
            .body(body)
    }

    // Synchronous verbs

    pub fn get(&mut self, url: &str) -> Result<Response, RequestError> {
        let request = self.take_request(Method::Get, url, None);
        self.executor.execute(request)
    }

    pub fn post(&mut self, url: &str, body: Option<Body>) -> Result<Response, RequestError> {
        let request = self.take_request(Method::Post, url, body);
        self.executor.execute(request)
    }

    pub fn put(&mut self, url: &str, body: Option<Body>) -> Result<Response, RequestError> {
        let request = self.take_request(Method::Put, url, body);
        self.executor.execute(request)
    }

    pub fn delete(&mut self, url: &str) -> Result<Response, RequestError> {
        let request = self.take_request(Method::Delete, url, None);
        self.executor.execute(request)
    }

    /// Run a fully built request. Pending headers are prepended and cleared.
    pub fn execute(&mut self, request: Request) -> Result<Response, RequestError> {
        let request = self.merge_pending(request);
        self.executor.execute(request)
    }

    // Asynchronous verbs

    pub fn get_async<C: Callback>(
        &mut self,
        url: &str,
        callback: C,
    ) -> Result<(), InvalidUsageError> {
        self.verb_async(Method::Get, url, None, Some(Box::new(callback)))
    }

    pub fn post_async<C: Callback>(
        &mut self,
        url: &str,
        body: Option<Body>,
        callback: C,
    ) -> Result<(), InvalidUsageError> {
        self.verb_async(Method::Post, url, body, Some(Box::new(callback)))
    }

    pub fn put_async<C: Callback>(
        &mut self,
        url: &str,
        body: Option<Body>,
        callback: C,
    ) -> Result<(), InvalidUsageError> {
        self.verb_async(Method::Put, url, body, Some(Box::new(callback)))
    }

    pub fn delete_async<C: Callback>(
        &mut self,
        url: &str,
        callback: C,
    ) -> Result<(), InvalidUsageError> {
        self.verb_async(Method::Delete, url, None, Some(Box::new(callback)))
    }

    /// Dispatch a fully built request. `None` for `callback` is rejected with
    /// `InvalidUsageError::MissingCallback` and leaves pending headers intact.
    pub fn execute_async(
        &mut self,
        request: Request,
        callback: Option<Box<dyn Callback>>,
    ) -> Result<(), InvalidUsageError> {
        let dispatcher = self.ready_dispatcher(&callback)?.clone();
        let saved = self.headers.clone();
        let request = self.merge_pending(request);
        self.submit(&dispatcher, request, callback, saved)
    }

    fn verb_async(
        &mut self,
        method: Method,
        url: &str,
        body: Option<Body>,
        callback: Option<Box<dyn Callback>>,
    ) -> Result<(), InvalidUsageError> {
        let dispatcher = self.ready_dispatcher(&callback)?.clone();
        let saved = self.headers.clone();
        let request = self.take_request(method, url, body);
        self.submit(&dispatcher, request, callback, saved)
    }

    // Checked before headers are taken, so these rejections leave the
    // client exactly as it was.
    fn ready_dispatcher(
        &self,
        callback: &Option<Box<dyn Callback>>,
    ) -> Result<&AsyncDispatcher, InvalidUsageError> {
        if callback.is_none() {
            return Err(InvalidUsageError::MissingCallback);
        }
        self.dispatcher
            .as_ref()
            .ok_or(InvalidUsageError::NoHomeContext)
    }

    /// Hand `request` to the dispatcher. If it is refused (the pool has shut
    /// down), the pending headers are restored from `saved`.
    fn submit(
        &mut self,
        dispatcher: &AsyncDispatcher,
        request: Request,
        callback: Option<Box<dyn Callback>>,
        saved: Vec<Header>,
    ) -> Result<(), InvalidUsageError> {
        let executor = self.executor.clone();
        let target = Target::new(request.method(), request.url());
        let result = dispatcher.dispatch(target, move || executor.execute(request), callback);
        if result.is_err() {
            self.headers = saved;
        }
        result
    }

    fn merge_pending(&mut self, request: Request) -> Request {
        let pending = mem::take(&mut self.headers);
        if pending.is_empty() {
            return request;
        }
        let method = request.method();
        let url = request.url().to_string();
        let mut request = request;
        let body = request.take_body();
        let own = request.header_list().to_vec();
        Request::new(method, url)
            .headers(pending)
            .headers(own)
            .body(body)
    }

    /// Shut down the worker pool if this client built it; a pool supplied
    /// through the builder is left running for its other users.
    pub fn shutdown(&self) {
        if let (true, Some(d)) = (self.owns_pool, &self.dispatcher) {
            d.pool().shutdown();
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles an `HttpClient`.
///
/// A client given a `HomeHandle` can issue async requests; without one it is
/// synchronous only. When a home handle is given but no pool, a pool sized by
/// the config is started and owned by the client.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    pool: Option<WorkerPool>,
    home: Option<HomeHandle>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn home(mut self, home: HomeHandle) -> Self {
        self.home = Some(home);
        self
    }

    pub fn build(self) -> Result<HttpClient, BuildError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(UreqTransport::from_config(&config)),
        };

        let mut owns_pool = false;
        let dispatcher = match (self.home, self.pool) {
            (Some(home), Some(pool)) => Some(AsyncDispatcher::new(pool, home)),
            (Some(home), None) => {
                owns_pool = true;
                Some(AsyncDispatcher::new(WorkerPool::from_config(&config)?, home))
            }
            (None, Some(_)) => {
                return Err(BuildError::InvalidConfig(
                    "a worker pool was supplied without a home context".to_string(),
                ))
            }
            (None, None) => None,
        };

        Ok(HttpClient {
            executor: RequestExecutor::new(transport),
            dispatcher,
            owns_pool,
            headers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransportError};
    use crate::home::HomeContext;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records requests; fails any URL containing "refused".
    #[derive(Default)]
    struct Scripted {
        seen: Mutex<Vec<Request>>,
    }

    impl Transport for Scripted {
        fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            if request.url().contains("refused") {
                return Err(TransportError::new(ErrorKind::Connect, "connection refused"));
            }
            Ok(Response::new(200, Vec::new(), b"ok".to_vec()))
        }
    }

    fn sync_client() -> (HttpClient, Arc<Scripted>) {
        let transport = Arc::new(Scripted::default());
        let client = HttpClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();
        (client, transport)
    }

    #[test]
    fn headers_are_sent_once_then_cleared() {
        let (mut client, transport) = sync_client();
        client.add_header("X-Test", "1");
        let resp = client.get("http://example.test/ok").unwrap();
        assert_eq!(resp.status(), 200);
        assert!(client.headers().is_empty());

        client.get("http://example.test/ok").unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].header_list(), &[Header::new("X-Test", "1")]);
        assert!(seen[1].header_list().is_empty());
    }

    #[test]
    fn every_verb_clears_headers_including_duplicates() {
        let (mut client, _) = sync_client();
        let url = "http://example.test/ok";
        type Verb = fn(&mut HttpClient, &str) -> Result<Response, RequestError>;
        let verbs: [Verb; 4] = [
            |c, u| c.get(u),
            |c, u| c.post(u, Some(Body::text("x"))),
            |c, u| c.put(u, None),
            |c, u| c.delete(u),
        ];
        for verb in verbs {
            client.add_header("X-Dup", "a").add_header("X-Dup", "b");
            verb(&mut client, url).unwrap();
            assert!(client.headers().is_empty());
            // Empty collection stays empty.
            verb(&mut client, url).unwrap();
            assert!(client.headers().is_empty());
        }
    }

    #[test]
    fn failure_still_clears_headers() {
        let (mut client, _) = sync_client();
        client.add_header("Authorization", "Bearer t");
        let err = client
            .post("http://refused.test/create", Some(Body::text("x")))
            .unwrap_err();
        assert!(err.is_connect());
        assert!(client.headers().is_empty());
    }

    #[test]
    fn execute_prepends_pending_headers() {
        let (mut client, transport) = sync_client();
        client.add_header("X-Pending", "1");
        let request = Request::put("http://example.test/ok")
            .header("X-Own", "2")
            .body(Body::text("b"));
        client.execute(request).unwrap();
        let seen = transport.seen.lock().unwrap();
        let names: Vec<_> = seen[0]
            .header_list()
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(names, vec!["X-Pending", "X-Own"]);
        assert_eq!(seen[0].body_ref().unwrap().as_bytes(), b"b");
        assert!(client.headers().is_empty());
    }

    #[test]
    fn async_without_home_context_is_invalid_usage() {
        let (mut client, _) = sync_client();
        let err = client
            .get_async("http://example.test/ok", |_: Result<Response, RequestError>| {})
            .unwrap_err();
        assert_eq!(err, InvalidUsageError::NoHomeContext);
    }

    #[test]
    fn missing_callback_keeps_headers_and_sends_nothing() {
        let home = HomeContext::new();
        let transport = Arc::new(Scripted::default());
        let mut client = HttpClient::builder()
            .transport(transport.clone())
            .home(home.handle())
            .build()
            .unwrap();
        client.add_header("X-Test", "1");

        let err = client
            .execute_async(Request::get("http://example.test/ok"), None)
            .unwrap_err();
        assert_eq!(err, InvalidUsageError::MissingCallback);
        assert_eq!(client.headers().len(), 1);

        client.shutdown();
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn async_verb_clears_headers_at_submission() {
        let mut home = HomeContext::new();
        let transport = Arc::new(Scripted::default());
        let mut client = HttpClient::builder()
            .transport(transport.clone())
            .home(home.handle())
            .build()
            .unwrap();
        let status = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&status);

        client.add_header("X-Test", "1");
        client
            .delete_async("http://example.test/ok", move |r: Result<Response, RequestError>| {
                *slot.lock().unwrap() = Some(r.map(|r| r.status()).ok());
            })
            .unwrap();
        assert!(client.headers().is_empty());

        assert!(home.run_next_timeout(Duration::from_secs(5)));
        assert_eq!(*status.lock().unwrap(), Some(Some(200)));
        assert_eq!(transport.seen.lock().unwrap()[0].header_list().len(), 1);
        client.shutdown();
    }

    #[test]
    fn refused_dispatch_puts_headers_back() {
        let home = HomeContext::new();
        let pool = WorkerPool::new(1, "closed").unwrap();
        let transport = Arc::new(Scripted::default());
        let mut client = HttpClient::builder()
            .transport(transport.clone())
            .pool(pool.clone())
            .home(home.handle())
            .build()
            .unwrap();
        pool.shutdown();

        client.add_header("X-Test", "1").add_header("X-Test", "2");
        let err = client
            .get_async("http://example.test/ok", |_: Result<Response, RequestError>| {})
            .unwrap_err();
        assert_eq!(err, InvalidUsageError::PoolShutDown);
        assert_eq!(
            client.headers(),
            &[Header::new("X-Test", "1"), Header::new("X-Test", "2")]
        );

        let err = client
            .execute_async(
                Request::get("http://example.test/ok").header("X-Own", "3"),
                Some(Box::new(|_: Result<Response, RequestError>| {})),
            )
            .unwrap_err();
        assert_eq!(err, InvalidUsageError::PoolShutDown);
        assert_eq!(client.headers().len(), 2);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn pool_without_home_is_rejected() {
        let err = HttpClient::builder()
            .pool(WorkerPool::new(1, "orphan").unwrap())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }

    #[test]
    fn shared_pool_is_not_shut_down_by_client() {
        let home = HomeContext::new();
        let pool = WorkerPool::new(1, "shared").unwrap();
        let client = HttpClient::builder()
            .transport(Arc::new(Scripted::default()))
            .pool(pool.clone())
            .home(home.handle())
            .build()
            .unwrap();
        client.shutdown();
        assert!(!pool.is_shut_down());
        pool.shutdown();
    }
}
