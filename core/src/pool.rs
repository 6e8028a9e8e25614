//! Prioritized background worker pool.
//!
//! # Design
//! Threads come from a rayon `ThreadPool`; ordering comes from a shared
//! binary heap. Every `submit` pushes one job onto the heap and spawns one
//! rayon task whose only duty is to pop the best job and run it, so each job
//! runs exactly once and the heap, not rayon's scheduler, decides which job
//! goes next. Ties are broken by submission sequence, giving FIFO order
//! inside a priority tier.
//!
//! The pool is an explicitly owned resource: it is created by the caller (or
//! by a client builder on the caller's behalf) and lives until the last
//! handle is dropped or `shutdown` is called.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::{error, trace};

use crate::config::ClientConfig;
use crate::error::{BuildError, InvalidUsageError};

/// Scheduling tier. Requests issued by the client all use `Normal`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    priority: Priority,
    seq: u64,
    task: Task,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    // Max-heap: higher priority first, then lower sequence number first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Queue {
    jobs: BinaryHeap<Job>,
    next_seq: u64,
    /// Queued plus running.
    pending: usize,
    closed: bool,
}

struct Shared {
    threads: rayon::ThreadPool,
    queue: Mutex<Queue>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_next(&self) {
        let job = self.lock().jobs.pop();
        if let Some(job) = job {
            trace!("worker picked job #{} ({:?})", job.seq, job.priority);
            // Decrement even if the task unwinds.
            let _done = Done(self);
            (job.task)();
        }
    }
}

struct Done<'a>(&'a Shared);

impl Drop for Done<'_> {
    fn drop(&mut self) {
        let mut queue = self.0.lock();
        queue.pending -= 1;
        if queue.pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Handle to a worker pool. Clones share the same threads and queue.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(num_threads: usize, thread_name: &str) -> Result<Self, BuildError> {
        if num_threads == 0 {
            return Err(BuildError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let prefix = thread_name.to_string();
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .panic_handler(|_| error!("worker job panicked"))
            .build()?;
        Ok(Self {
            shared: Arc::new(Shared {
                threads,
                queue: Mutex::new(Queue::default()),
                idle: Condvar::new(),
            }),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, BuildError> {
        config.validate()?;
        Self::new(config.worker_threads, &config.thread_name)
    }

    /// Queue `task` to run once on a worker thread. Never blocks on the
    /// task itself.
    pub fn submit<F>(&self, priority: Priority, task: F) -> Result<(), InvalidUsageError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut queue = self.shared.lock();
            if queue.closed {
                return Err(InvalidUsageError::PoolShutDown);
            }
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.pending += 1;
            queue.jobs.push(Job {
                priority,
                seq,
                task: Box::new(task),
            });
            trace!("queued job #{seq} ({priority:?})");
        }
        let shared = Arc::clone(&self.shared);
        self.shared.threads.spawn_fifo(move || shared.run_next());
        Ok(())
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn num_threads(&self) -> usize {
        self.shared.threads.current_num_threads()
    }

    /// Stop accepting work and block until every queued and running job
    /// has finished. Must not be called from a worker thread.
    pub fn shutdown(&self) {
        let mut queue = self.shared.lock();
        queue.closed = true;
        while queue.pending > 0 {
            queue = self
                .shared
                .idle
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.num_threads())
            .field("pending", &self.pending())
            .finish()
    }
}
