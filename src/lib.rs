//! Asynchronous dispatch of computations with captured outcomes.
//!
//! Everything lives in `dispatch_core`, this crate re-exports it under one name.
pub use dispatch_core::*;
