//! Runs caller-supplied computations on a worker substrate, captures their result or
//! failure into an [`Outcome`] and delivers it exactly once, by callback or through an
//! awaitable future.
//!
//! ```rust
//! use anyhow::bail;
//! use dispatch_core::Dispatcher;
//! use futures_executor::block_on;
//!
//! let dispatcher = Dispatcher::threaded("docs");
//!
//! assert_eq!(block_on(dispatcher.call_value(|a: u32, b: u32| a + b, (40, 2))), 42);
//!
//! let outcome = block_on(dispatcher.call_outcome(|| -> anyhow::Result<u32> { bail!("no") }, ()));
//! assert_eq!(outcome.failure().unwrap().to_string(), "no");
//! ```
pub mod computation;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod substrate;
pub mod testing;

pub use computation::{Computation, IntoResult};
pub use dispatcher::{
    completion, CallbackFuture, Completion, Dispatcher, DispatcherBuilder, OutcomeFuture,
    ValueFuture,
};
pub use error::DispatchError;
pub use outcome::Outcome;
pub use substrate::{Job, Substrate, ThreadPerDispatch};
