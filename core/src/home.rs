//! The home context: a task queue drained by the thread that owns it.
//!
//! # Design
//! Callbacks must run on the context that issued the request, not on a
//! worker. A `HomeContext` owns the receiving end of an unbounded queue and
//! is drained explicitly by its owner, either from a plain thread
//! (`run_pending`, `run_next_timeout`, `run_next_blocking`) or from inside a
//! single-threaded event loop (`run_next`). Workers only ever hold a
//! `HomeHandle`, whose `post` enqueues, wakes the owner and returns; it never
//! waits for the owner and never runs the task itself.
//!
//! `HomeContext` is deliberately `!Send`: it can only be drained on the
//! thread that created it.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

use log::trace;
use tokio::sync::mpsc;

use crate::error::ContextClosed;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Owning side of the queue. There is exactly one drainer.
pub struct HomeContext {
    tx: mpsc::UnboundedSender<Task>,
    rx: mpsc::UnboundedReceiver<Task>,
    owner: Thread,
    _not_send: PhantomData<Rc<()>>,
}

impl HomeContext {
    /// Create a context owned by the current thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            owner: thread::current(),
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> HomeHandle {
        HomeHandle {
            tx: self.tx.clone(),
            owner: self.owner.clone(),
        }
    }

    /// The thread that created this context.
    pub fn owner(&self) -> ThreadId {
        self.owner.id()
    }

    /// Run every task that is already queued, without waiting.
    /// Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!("home context ran {ran} task(s)");
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it. Returns whether a task ran.
    pub fn run_next_timeout(&mut self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Too far out to represent: no different from waiting forever.
            self.run_next_blocking();
            return true;
        };
        loop {
            if let Ok(task) = self.rx.try_recv() {
                task();
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::park_timeout(deadline - now);
        }
    }

    /// Block the current thread until one task arrives, then run it.
    pub fn run_next_blocking(&mut self) {
        loop {
            if let Ok(task) = self.rx.try_recv() {
                task();
                return;
            }
            thread::park();
        }
    }

    /// Await one task and run it. For owners that drive a single-threaded
    /// event loop.
    pub async fn run_next(&mut self) {
        // The context holds a sender itself, so the channel never closes.
        if let Some(task) = self.rx.recv().await {
            task();
        }
    }
}

impl Default for HomeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HomeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeContext")
            .field("owner", &self.owner.id())
            .finish()
    }
}

/// Posting side of a home context. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct HomeHandle {
    tx: mpsc::UnboundedSender<Task>,
    owner: Thread,
}

impl HomeHandle {
    /// Enqueue `task` to run on the home context. Never blocks and never
    /// runs `task` inline.
    pub fn post<F>(&self, task: F) -> Result<(), ContextClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(task)).map_err(|_| ContextClosed)?;
        self.owner.unpark();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// The thread the context was created on.
    pub fn owner(&self) -> ThreadId {
        self.owner.id()
    }
}

impl fmt::Debug for HomeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeHandle")
            .field("owner", &self.owner.id())
            .field("closed", &self.is_closed())
            .finish()
    }
}
