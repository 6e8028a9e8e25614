//! Completion callbacks and the terminal outcome they receive.

use crate::error::RequestError;
use crate::http::Response;

/// Receives the outcome of one asynchronous request.
///
/// Both methods consume the callback, so at most one of them can ever run.
/// The dispatcher guarantees that exactly one does, on the home context.
///
/// Any `FnOnce(Result<Response, RequestError>)` closure is a callback.
pub trait Callback: Send + 'static {
    fn on_complete(self: Box<Self>, response: Response);

    fn on_error(self: Box<Self>, error: RequestError);
}

impl<F> Callback for F
where
    F: FnOnce(Result<Response, RequestError>) + Send + 'static,
{
    fn on_complete(self: Box<Self>, response: Response) {
        (*self)(Ok(response))
    }

    fn on_error(self: Box<Self>, error: RequestError) {
        (*self)(Err(error))
    }
}

/// The single result a request produces.
#[derive(Debug)]
pub enum Outcome {
    Succeeded(Response),
    Failed(RequestError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    /// Hand the outcome to the matching callback method.
    pub fn deliver(self, callback: Box<dyn Callback>) {
        match self {
            Outcome::Succeeded(response) => callback.on_complete(response),
            Outcome::Failed(error) => callback.on_error(error),
        }
    }
}

impl From<Result<Response, RequestError>> for Outcome {
    fn from(result: Result<Response, RequestError>) -> Self {
        match result {
            Ok(response) => Outcome::Succeeded(response),
            Err(error) => Outcome::Failed(error),
        }
    }
}
