//! Background execution with delivery back onto the home context.
//!
//! # Design
//! Each call moves through `Submitted -> Running -> {Succeeded, Failed} ->
//! Delivered`. The thunk runs once on a pool worker and yields an `Outcome`
//! value; that value, together with the callback, is posted to the home
//! context captured at construction. The callback therefore only ever runs
//! when the home context drains its queue: never inside `dispatch` and never
//! on the worker.
//!
//! A thunk that panics is turned into a failed outcome so the callback still
//! fires exactly once.

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, trace, warn};
use uuid::Uuid;

use crate::callback::{Callback, Outcome};
use crate::error::{InvalidUsageError, RequestError};
use crate::home::HomeHandle;
use crate::http::{Method, Response};
use crate::pool::{Priority, WorkerPool};

/// Where a request was headed, for diagnostics and for describing a
/// panicked thunk as a `RequestError`.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub url: String,
}

impl Target {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }
}

/// Runs request thunks on a worker pool and posts outcomes home.
#[derive(Clone, Debug)]
pub struct AsyncDispatcher {
    pool: WorkerPool,
    home: HomeHandle,
}

impl AsyncDispatcher {
    pub fn new(pool: WorkerPool, home: HomeHandle) -> Self {
        Self { pool, home }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn home(&self) -> &HomeHandle {
        &self.home
    }

    /// Schedule `thunk` at normal priority. See `dispatch_with_priority`.
    pub fn dispatch<F>(
        &self,
        target: Target,
        thunk: F,
        callback: Option<Box<dyn Callback>>,
    ) -> Result<(), InvalidUsageError>
    where
        F: FnOnce() -> Result<Response, RequestError> + Send + 'static,
    {
        self.dispatch_with_priority(Priority::Normal, target, thunk, callback)
    }

    /// Schedule `thunk` on the pool and return immediately.
    ///
    /// A missing callback is rejected here, before anything is queued.
    pub fn dispatch_with_priority<F>(
        &self,
        priority: Priority,
        target: Target,
        thunk: F,
        callback: Option<Box<dyn Callback>>,
    ) -> Result<(), InvalidUsageError>
    where
        F: FnOnce() -> Result<Response, RequestError> + Send + 'static,
    {
        let callback = callback.ok_or(InvalidUsageError::MissingCallback)?;
        let id = Uuid::new_v4();
        let home = self.home.clone();

        self.pool.submit(priority, move || {
            trace!("[{id}] running {} {}", target.method, target.url);
            let outcome = run_thunk(&target, thunk);
            match &outcome {
                Outcome::Succeeded(resp) => debug!(
                    "[{id}] {} {} succeeded ({})",
                    target.method,
                    target.url,
                    resp.status()
                ),
                Outcome::Failed(e) => error!("[{id}] request failed: {e}: {:?}", e),
            }

            let posted = home.post(move || {
                outcome.deliver(callback);
                trace!("[{id}] delivered");
            });
            if posted.is_err() {
                warn!(
                    "[{id}] home context closed; dropping outcome of {} {}",
                    target.method, target.url
                );
            }
        })?;

        debug!("[{id}] submitted");
        Ok(())
    }
}

fn run_thunk<F>(target: &Target, thunk: F) -> Outcome
where
    F: FnOnce() -> Result<Response, RequestError>,
{
    match catch_unwind(AssertUnwindSafe(thunk)) {
        Ok(result) => result.into(),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Outcome::Failed(RequestError::other(
                target.method,
                &target.url,
                format!("request panicked: {msg}"),
            ))
        }
    }
}
