use crate::{computation::Computation, error::DispatchError};
use std::{
    fmt::Debug,
    panic::{catch_unwind, AssertUnwindSafe},
};

/// Completed state of a single dispatch.
///
/// Outcome is created empty inside the worker job, written exactly once by
/// [`Outcome::run`] and then moved to whoever consumes the dispatch. Consumers only
/// get read access (or take it apart by value), so nothing can change it after
/// delivery.
///
/// After completion exactly one of these holds:
///
/// * `failure()` is `None` and `value()` is what the computation returned.
/// * `failure()` is `Some` and `value()` is `Z::default()`.
#[derive(Debug)]
pub struct Outcome<Z> {
    value: Z,
    failure: Option<anyhow::Error>,
}

impl<Z> Outcome<Z>
where
    Z: Default,
{
    pub(crate) fn empty() -> Self {
        Self {
            value: Z::default(),
            failure: None,
        }
    }

    /// Outcome of a dispatch that never produced one, see [`DispatchError::Abandoned`].
    pub(crate) fn abandoned() -> Self {
        Self {
            value: Z::default(),
            failure: Some(DispatchError::Abandoned.into()),
        }
    }

    /// Invokes `computation` with `args` and records what happened.
    ///
    /// An `Err` return and a panic are both recorded as the failure. Side effects the
    /// computation made before failing are left as they are.
    pub(crate) fn run<F, Args>(&mut self, computation: F, args: Args)
    where
        F: Computation<Args, Z>,
    {
        match catch_unwind(AssertUnwindSafe(move || computation.invoke(args))) {
            Ok(Ok(value)) => {
                self.value = value;
                self.failure = None;
            }
            Ok(Err(e)) => self.fail(e),
            Err(payload) => self.fail(DispatchError::from_panic(payload).into()),
        }
    }

    fn fail(&mut self, failure: anyhow::Error) {
        self.value = Z::default();
        self.failure = Some(failure);
    }
}

impl<Z> Outcome<Z> {
    /// Computed value, `Z::default()` when the computation failed.
    pub fn value(&self) -> &Z {
        &self.value
    }

    /// Captured failure, `None` when the computation succeeded.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        self.failure.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Returns the value and drops the failure, if any.
    pub fn into_value(self) -> Z {
        self.value
    }

    pub fn into_parts(self) -> (Z, Option<anyhow::Error>) {
        (self.value, self.failure)
    }

    /// Turns Self into a regular `anyhow::Result`, the idiomatic way to
    /// propagate a captured failure with `?`.
    pub fn into_result(self) -> anyhow::Result<Z> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.value),
        }
    }
}
