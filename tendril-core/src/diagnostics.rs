//! Diagnostics
//!
//! Conditions that are handled silently from the caller's point of view but
//! are still worth surfacing: writes rejected by a readonly handle, nested
//! runs skipped by the re-entrancy guard, writes to a getter-only computed.
//!
//! Every report goes to `tracing` and to the innermost active collector
//! installed by [`capture`], so tests and tooling can assert on them without
//! scraping log output.

use std::cell::RefCell;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::observe::TargetId;
use crate::reactive::EffectId;

thread_local! {
    static COLLECTORS: RefCell<Vec<Vec<Diagnostic>>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("set operation on key \"{key}\" failed: target {target:?} is readonly")]
    ReadonlyWriteRejected { key: String, target: TargetId },

    #[error("effect {effect:?} is already running, nested run skipped")]
    ReentrantEffectSkipped { effect: EffectId },

    #[error("write to computed {computed:?} failed: computed value is readonly")]
    ReadonlyComputedWrite { computed: EffectId },
}

impl Diagnostic {
    /// Whether this diagnostic is logged at warning level.
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::ReentrantEffectSkipped { .. })
    }
}

/// Log a diagnostic and hand it to the innermost active collector.
pub(crate) fn report(diagnostic: Diagnostic) {
    match &diagnostic {
        Diagnostic::ReadonlyWriteRejected { key, target } => {
            warn!(key = %key, object = ?target, "{diagnostic}");
        }
        Diagnostic::ReentrantEffectSkipped { effect } => {
            debug!(effect = ?effect, "{diagnostic}");
        }
        Diagnostic::ReadonlyComputedWrite { computed } => {
            warn!(computed = ?computed, "{diagnostic}");
        }
    }

    COLLECTORS.with(|collectors| {
        if let Some(top) = collectors.borrow_mut().last_mut() {
            top.push(diagnostic);
        }
    });
}

/// Run `f` and return everything it reported.
///
/// Captures nest: diagnostics go to the innermost capture only.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Diagnostic>) {
    COLLECTORS.with(|collectors| collectors.borrow_mut().push(Vec::new()));
    let guard = CaptureGuard { finished: false };
    let result = f();
    (result, guard.finish())
}

/// Pops the collector pushed by [`capture`], even if `f` panics.
struct CaptureGuard {
    finished: bool,
}

impl CaptureGuard {
    fn finish(mut self) -> Vec<Diagnostic> {
        self.finished = true;
        COLLECTORS
            .with(|collectors| collectors.borrow_mut().pop())
            .unwrap_or_default()
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.finished {
            COLLECTORS.with(|collectors| {
                collectors.borrow_mut().pop();
            });
        }
    }
}
