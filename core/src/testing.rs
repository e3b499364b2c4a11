//! Substrates for deterministic tests of code built on top of a [`Dispatcher`].
//!
//! [`Dispatcher`]: crate::Dispatcher
use crate::substrate::{Job, Substrate};
use log::debug;

/// Runs every job synchronously inside `submit`, on the caller's thread.
/// Fire-and-forget callbacks have therefore already run when the dispatch
/// method returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Substrate for Inline {
    fn submit(&self, job: Job) {
        job()
    }
}

/// Discards every job without running it, simulates a substrate that lost work.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dropping;

impl Substrate for Dropping {
    fn submit(&self, job: Job) {
        debug!("Dropping::submit - discarding job");
        drop(job);
    }
}
