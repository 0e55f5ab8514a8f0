//! Error types for the fallible parts of the engine.
//!
//! Most reactive operations never fail: rejected writes and skipped
//! re-entrant runs are reported through [`crate::diagnostics`] instead.
//! The errors here cover the few places where a caller asked for something
//! that cannot be produced.

use thiserror::Error;

use crate::observe::TargetId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The arena slot behind an object handle has been released.
    #[error("target {0:?} has been released")]
    TargetReleased(TargetId),

    /// Only objects and observed handles can be wrapped.
    #[error("cannot observe a {0} value")]
    NotObservable(&'static str),

    /// JSON export reached an object that is already being exported.
    #[error("value graph contains a reference cycle")]
    CyclicValue,

    /// A computed getter read its own value before the first evaluation
    /// finished.
    #[error("computed value was read from its own getter before it produced a value")]
    CyclicComputed,
}
