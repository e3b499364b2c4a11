use futures_executor::ThreadPool;
use log::error;
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    thread,
};

/// Unit of work handed to a substrate. Wraps a computation together with the
/// delivery of its outcome.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker substrate that dispatchers submit jobs to.
///
/// Implementations decide where and when a job runs but must run it at most once.
/// Dropping a job without running it is allowed; awaiting callers then observe a
/// [`DispatchError::Abandoned`](crate::error::DispatchError::Abandoned) failure.
pub trait Substrate: Send + Sync {
    fn submit(&self, job: Job);
}

/// Runs every job on a freshly spawned OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadPerDispatch {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl ThreadPerDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets name given to spawned threads.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets stack size (in bytes) of spawned threads.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }
}

impl Substrate for ThreadPerDispatch {
    fn submit(&self, job: Job) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // The job is dropped together with the failed builder.
        if let Err(e) = builder.spawn(job) {
            error!("could not spawn dispatch thread: {}", e);
        }
    }
}

/// Shared pool. Panics escaping a job (a completion callback that panicked) are
/// logged and contained so the pool keeps all of its workers.
impl Substrate for ThreadPool {
    fn submit(&self, job: Job) {
        self.spawn_ok(async move {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("dispatch job panicked on the thread pool");
            }
        });
    }
}

/// Runs jobs through tokio's blocking pool so computations never stall the async
/// workers.
#[cfg(feature = "tokio")]
impl Substrate for tokio::runtime::Handle {
    fn submit(&self, job: Job) {
        // JoinHandle is detached, panics stay inside the blocking task.
        let _ = self.spawn_blocking(job);
    }
}
