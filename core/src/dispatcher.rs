use crate::{
    computation::Computation,
    outcome::Outcome,
    substrate::{Substrate, ThreadPerDispatch},
};
use anyhow::{bail, Context};
use futures_channel::oneshot;
use futures_executor::ThreadPool;
use log::debug;
use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};

/// Completion callback, receives the dispatcher that ran the computation and its
/// outcome.
pub type Completion<Z> = Box<dyn FnOnce(&Dispatcher, Outcome<Z>) + Send + 'static>;

/// Boxes `callback` into the optional form every callback-taking dispatch expects.
///
/// ```rust
/// use dispatch_core::{completion, Dispatcher, Outcome};
///
/// let dispatcher = Dispatcher::threaded("docs");
/// dispatcher.call(
///     || 42_u32,
///     (),
///     completion(|_d: &Dispatcher, outcome: Outcome<u32>| assert_eq!(*outcome.value(), 42)),
/// );
/// ```
pub fn completion<Z, C>(callback: C) -> Option<Completion<Z>>
where
    C: FnOnce(&Dispatcher, Outcome<Z>) + Send + 'static,
{
    Some(Box::new(callback))
}

struct Inner {
    name: String,
    substrate: Box<dyn Substrate>,
}

/// Runs computations on a worker substrate and delivers their [`Outcome`].
///
/// Dispatcher holds no per-dispatch state: clones share the same substrate and the
/// same identity, and any number of dispatches may be in flight at once. Work is
/// submitted as soon as a dispatch method is called, the returned futures only
/// observe its completion. There is no way to cancel a submitted computation.
///
/// Every delivery style exists twice, `call*` for computations producing a value and
/// `act*` for procedures whose outcome only carries a possible failure.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates new dispatcher that submits its jobs to `substrate`.
    pub fn new<S>(name: impl Into<String>, substrate: S) -> Self
    where
        S: Substrate + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                substrate: Box::new(substrate),
            }),
        }
    }

    /// Creates new dispatcher that spawns one thread per dispatch, threads are named
    /// after the dispatcher.
    pub fn threaded(name: impl Into<String>) -> Self {
        let name = name.into();
        let substrate = ThreadPerDispatch::new().name(name.clone());
        Self::new(name, substrate)
    }

    /// Returns builder for a dispatcher backed by its own thread pool.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Indicates if both handles refer to the same dispatcher (one is a clone of
    /// the other).
    pub fn same_as(&self, other: &Dispatcher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Submits computation and returns receiver of its outcome.
    fn submit<F, Args, Z>(&self, computation: F, args: Args) -> oneshot::Receiver<Outcome<Z>>
    where
        F: Computation<Args, Z>,
        Args: Send + 'static,
        Z: Default + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let name = self.inner.name.clone();

        debug!("dispatcher `{}`: submitting awaitable dispatch", name);
        self.inner.substrate.submit(Box::new(move || {
            let mut outcome = Outcome::empty();
            outcome.run(computation, args);

            if tx.send(outcome).is_err() {
                debug!(
                    "dispatcher `{}`: receiver dropped before completion, outcome discarded",
                    name
                );
            }
        }));

        rx
    }

    /// Fire-and-forget dispatch. Returns immediately, `callback` (if any) is invoked
    /// on the worker once the computation finished.
    ///
    /// A panicking callback is not captured into anything, it unwinds on the worker
    /// and how that is handled is up to the substrate.
    pub fn call<F, Args, Z>(&self, computation: F, args: Args, callback: Option<Completion<Z>>)
    where
        F: Computation<Args, Z>,
        Args: Send + 'static,
        Z: Default + Send + 'static,
    {
        let dispatcher = self.clone();

        debug!("dispatcher `{}`: submitting dispatch", self.name());
        self.inner.substrate.submit(Box::new(move || {
            let mut outcome = Outcome::empty();
            outcome.run(computation, args);

            match callback {
                Some(callback) => callback(&dispatcher, outcome),
                None => debug!(
                    "dispatcher `{}`: no completion callback, dispatch finished silently",
                    dispatcher.name()
                ),
            }
        }));
    }

    /// Dispatch whose future resolves after `callback` returned. The callback runs
    /// in the task awaiting the future, so a panicking callback propagates there.
    pub fn call_await<F, Args, Z>(
        &self,
        computation: F,
        args: Args,
        callback: Option<Completion<Z>>,
    ) -> CallbackFuture<Z>
    where
        F: Computation<Args, Z>,
        Args: Send + 'static,
        Z: Default + Send + 'static,
    {
        CallbackFuture {
            dispatcher: self.clone(),
            outcome: OutcomeFuture::new(self.submit(computation, args)),
            callback,
        }
    }

    /// Dispatch resolving to its [`Outcome`]. Inspect `Outcome::failure` to find out
    /// whether the computation succeeded.
    pub fn call_outcome<F, Args, Z>(&self, computation: F, args: Args) -> OutcomeFuture<Z>
    where
        F: Computation<Args, Z>,
        Args: Send + 'static,
        Z: Default + Send + 'static,
    {
        OutcomeFuture::new(self.submit(computation, args))
    }

    /// Dispatch resolving to the computed value only.
    ///
    /// **Hazard**: a failed computation resolves to `Z::default()` and the failure is
    /// discarded, nothing on this call path reveals it. Use [`Dispatcher::call_outcome`]
    /// whenever failures matter.
    pub fn call_value<F, Args, Z>(&self, computation: F, args: Args) -> ValueFuture<Z>
    where
        F: Computation<Args, Z>,
        Args: Send + 'static,
        Z: Default + Send + 'static,
    {
        ValueFuture {
            outcome: self.call_outcome(computation, args),
        }
    }

    /// Fire-and-forget dispatch of a procedure, see [`Dispatcher::call`].
    pub fn act<F, Args>(&self, procedure: F, args: Args, callback: Option<Completion<()>>)
    where
        F: Computation<Args, ()>,
        Args: Send + 'static,
    {
        self.call(procedure, args, callback)
    }

    /// Procedure counterpart of [`Dispatcher::call_await`].
    pub fn act_await<F, Args>(
        &self,
        procedure: F,
        args: Args,
        callback: Option<Completion<()>>,
    ) -> CallbackFuture<()>
    where
        F: Computation<Args, ()>,
        Args: Send + 'static,
    {
        self.call_await(procedure, args, callback)
    }

    /// Procedure counterpart of [`Dispatcher::call_outcome`], the outcome's value is
    /// always `()`.
    pub fn act_outcome<F, Args>(&self, procedure: F, args: Args) -> OutcomeFuture<()>
    where
        F: Computation<Args, ()>,
        Args: Send + 'static,
    {
        self.call_outcome(procedure, args)
    }

    /// Procedure counterpart of [`Dispatcher::call_value`]. Resolves once the procedure
    /// finished and carries the same hazard: failures are discarded.
    pub fn act_value<F, Args>(&self, procedure: F, args: Args) -> ValueFuture<()>
    where
        F: Computation<Args, ()>,
        Args: Send + 'static,
    {
        self.call_value(procedure, args)
    }
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

/// Resolves to the [`Outcome`] of a submitted dispatch.
#[must_use = "the dispatch is already running, await this to observe its outcome"]
pub struct OutcomeFuture<Z> {
    rx: oneshot::Receiver<Outcome<Z>>,
}

impl<Z> OutcomeFuture<Z> {
    fn new(rx: oneshot::Receiver<Outcome<Z>>) -> Self {
        Self { rx }
    }
}

impl<Z> Future for OutcomeFuture<Z>
where
    Z: Default,
{
    type Output = Outcome<Z>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => {
                debug!("dispatch job dropped by its substrate before completing");
                Poll::Ready(Outcome::abandoned())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Resolves to the computed value of a submitted dispatch, discarding failures.
#[must_use = "the dispatch is already running, await this to observe its value"]
pub struct ValueFuture<Z> {
    outcome: OutcomeFuture<Z>,
}

impl<Z> Future for ValueFuture<Z>
where
    Z: Default,
{
    type Output = Z;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(outcome) => {
                if let Some(failure) = outcome.failure() {
                    debug!("discarding failure of unwrapped dispatch: {:#}", failure);
                }
                Poll::Ready(outcome.into_value())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Resolves after the completion callback of a submitted dispatch returned.
#[must_use = "the callback only runs while this future is awaited"]
pub struct CallbackFuture<Z> {
    dispatcher: Dispatcher,
    outcome: OutcomeFuture<Z>,
    callback: Option<Completion<Z>>,
}

impl<Z> Future for CallbackFuture<Z>
where
    Z: Default,
{
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };

        if let Some(callback) = self.callback.take() {
            callback(&self.dispatcher, outcome);
        }
        Poll::Ready(())
    }
}

/// Builder for a [`Dispatcher`] owning a `futures_executor::ThreadPool`.
///
/// ```rust
/// use dispatch_core::Dispatcher;
///
/// let dispatcher = Dispatcher::builder()
///     .name("reports")
///     .pool_size(4)
///     .build()
///     .unwrap();
/// assert_eq!(dispatcher.name(), "reports");
/// ```
#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    name: String,
    pool_size: Option<usize>,
    thread_name_prefix: Option<String>,
    stack_size: Option<usize>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            name: String::from("dispatcher"),
            pool_size: None,
            thread_name_prefix: None,
            stack_size: None,
        }
    }
}

impl DispatcherBuilder {
    /// Sets dispatcher's name, used as its identity in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets number of pool threads. Defaults to the number of CPUs.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Sets prefix of pool thread names. Defaults to `<name>-`.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Sets stack size (in bytes) of pool threads.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn build(self) -> anyhow::Result<Dispatcher> {
        let mut builder = ThreadPool::builder();

        if let Some(pool_size) = self.pool_size {
            if pool_size == 0 {
                bail!("dispatcher `{}`: pool size must be at least 1", self.name);
            }
            builder.pool_size(pool_size);
        }
        if let Some(stack_size) = self.stack_size {
            builder.stack_size(stack_size);
        }
        builder.name_prefix(
            self.thread_name_prefix
                .unwrap_or_else(|| format!("{}-", self.name)),
        );

        let pool = builder
            .create()
            .with_context(|| format!("could not create thread pool for `{}`", self.name))?;

        Ok(Dispatcher::new(self.name, pool))
    }
}

#[cfg(test)]
mod tests {
    use super::{completion, Dispatcher};
    use crate::{
        error::DispatchError,
        outcome::Outcome,
        testing::{Dropping, Inline},
    };
    use anyhow::{anyhow, bail};
    use futures_executor::block_on;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[test]
    fn test_call_invokes_callback_with_outcome() {
        let dispatcher = Dispatcher::new("inline", Inline);
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();

        dispatcher.call(
            |a: i32, b: i32| a * b,
            (6, 7),
            completion(move |d: &Dispatcher, outcome: Outcome<i32>| {
                *s.lock().unwrap() = Some((d.name().to_string(), outcome.into_value()));
            }),
        );

        assert_eq!(*seen.lock().unwrap(), Some((String::from("inline"), 42)));
    }

    #[test]
    fn test_callback_receives_the_dispatching_instance() {
        let dispatcher = Dispatcher::new("inline", Inline);
        let other = Dispatcher::new("inline", Inline);
        let expected = dispatcher.clone();
        let matched = Arc::new(Mutex::new((false, true)));
        let m = matched.clone();

        dispatcher.call(
            || 1_u8,
            (),
            completion(move |d: &Dispatcher, _: Outcome<u8>| {
                *m.lock().unwrap() = (d.same_as(&expected), d.same_as(&other));
            }),
        );

        assert_eq!(*matched.lock().unwrap(), (true, false));
    }

    #[test]
    fn test_call_without_callback() {
        let dispatcher = Dispatcher::new("inline", Inline);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        dispatcher.call(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            (),
            None,
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_outcome_and_value_styles() {
        let dispatcher = Dispatcher::new("inline", Inline);

        let failing = || -> anyhow::Result<u32> { bail!("nope") };

        let outcome = block_on(dispatcher.call_outcome(failing, ()));
        assert_eq!(*outcome.value(), 0);
        assert_eq!(outcome.failure().unwrap().to_string(), "nope");

        assert_eq!(block_on(dispatcher.call_value(failing, ())), 0);

        let len = block_on(dispatcher.call_value(|s: String| s.len(), (String::from("four"),)));
        assert_eq!(len, 4);
    }

    #[test]
    fn test_action_styles() {
        let dispatcher = Dispatcher::new("inline", Inline);
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let outcome = block_on(dispatcher.act_outcome(
            move |n: usize| {
                c.fetch_add(n, Ordering::SeqCst);
            },
            (2,),
        ));
        assert!(outcome.is_success());

        let outcome =
            block_on(dispatcher.act_outcome(|| -> anyhow::Result<()> { Err(anyhow!("x")) }, ()));
        assert!(outcome.is_failure());

        let c = calls.clone();
        block_on(dispatcher.act_value(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            (),
        ));

        let c = calls.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        block_on(dispatcher.act_await(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            (),
            completion(move |_: &Dispatcher, outcome: Outcome<()>| {
                assert!(outcome.is_success());
                s.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_job_is_abandoned() {
        let dispatcher = Dispatcher::new("dropping", Dropping);

        let outcome = block_on(dispatcher.call_outcome(|| 5_i64, ()));
        assert_eq!(*outcome.value(), 0);
        assert_eq!(
            outcome.failure().unwrap().downcast_ref::<DispatchError>(),
            Some(&DispatchError::Abandoned)
        );

        assert_eq!(block_on(dispatcher.call_value(|| 5_i64, ())), 0);

        let abandoned = Arc::new(AtomicUsize::new(0));
        let a = abandoned.clone();
        block_on(dispatcher.call_await(
            || 5_i64,
            (),
            completion(move |_: &Dispatcher, outcome: Outcome<i64>| {
                if outcome.is_failure() {
                    a.fetch_add(1, Ordering::SeqCst);
                }
            }),
        ));
        assert_eq!(abandoned.load(Ordering::SeqCst), 1);

        dispatcher.call(
            || 5_i64,
            (),
            completion(|_: &Dispatcher, _: Outcome<i64>| panic!("must not be called")),
        );
    }

    #[test]
    fn test_builder() -> anyhow::Result<()> {
        let dispatcher = Dispatcher::builder()
            .name("pool")
            .pool_size(2)
            .thread_name_prefix("pool-worker-")
            .stack_size(512 * 1024)
            .build()?;
        assert_eq!(dispatcher.name(), "pool");
        assert_eq!(format!("{:?}", dispatcher), "Dispatcher { name: \"pool\", .. }");

        let thread_name = block_on(dispatcher.call_value(
            || std::thread::current().name().map(String::from),
            (),
        ));
        assert!(thread_name.unwrap().starts_with("pool-worker-"));

        let err = Dispatcher::builder().pool_size(0).build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "dispatcher `dispatcher`: pool size must be at least 1"
        );
        Ok(())
    }
}
