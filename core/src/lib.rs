//! Blocking HTTP verbs with callback delivery onto a home context.
//!
//! # Overview
//! `HttpClient` issues GET/POST/PUT/DELETE either synchronously on the
//! calling thread or asynchronously on a background `WorkerPool`. An async
//! call's single outcome is posted back to the `HomeContext` the client was
//! built with and handed to the caller's `Callback` there.
//!
//! # Design
//! - `Transport` is the only seam to the network; `UreqTransport` is the
//!   default implementation.
//! - `RequestExecutor` performs one blocking exchange and rewraps every
//!   transport failure as `RequestError`.
//! - `AsyncDispatcher` runs the executor on a worker and posts the `Outcome`
//!   to the home context, which runs the callback when its owner drains it.
//! - Per-request headers live in an immutable `Request`; the client's
//!   pending-header list is moved into it when a call begins.
//!
//! ```no_run
//! use courier_core::{HomeContext, HttpClient, RequestError, Response};
//! use std::time::Duration;
//!
//! let mut home = HomeContext::new();
//! let mut client = HttpClient::builder().home(home.handle()).build()?;
//!
//! client.add_header("Accept", "application/json");
//! client.get_async("http://localhost:3000/ok", |r: Result<Response, RequestError>| {
//!     match r {
//!         Ok(resp) => println!("{}", resp.text()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! })?;
//! home.run_next_timeout(Duration::from_secs(5));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod home;
pub mod http;
pub mod pool;
pub mod transport;

pub use callback::{Callback, Outcome};
pub use client::{ClientBuilder, HttpClient};
pub use config::ClientConfig;
pub use dispatcher::{AsyncDispatcher, Target};
pub use error::{
    BuildError, ContextClosed, ErrorKind, InvalidUsageError, RequestError, TransportError,
};
pub use executor::RequestExecutor;
pub use home::{HomeContext, HomeHandle};
pub use http::{Body, Header, Method, Request, Response};
pub use pool::{Priority, WorkerPool};
pub use transport::{Transport, UreqTransport};
