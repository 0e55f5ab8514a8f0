//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be collected as dependencies.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect pushes a frame
//! naming that effect; the frame below it is the effect's parent. The guard
//! returned by [`ReactiveContext::enter`] pops the frame when dropped, so the
//! previous effect and collection flag are restored on every exit path,
//! including unwinding out of a panicking effect body.
//!
//! [`untracked`] pushes a frame that keeps the current effect (so the
//! self-trigger guard still applies) but turns collection off.

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{EffectId, Subscriber};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// The effect this frame belongs to, if any.
    subscriber: Option<Rc<dyn Subscriber>>,
    /// Whether reads in this frame register dependencies.
    collecting: bool,
}

impl ContextEntry {
    fn id(&self) -> Option<EffectId> {
        self.subscriber.as_ref().map(|subscriber| subscriber.core().id())
    }
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    id: Option<EffectId>,
}

impl ReactiveContext {
    /// Enter a collecting frame for the given effect.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let id = Some(subscriber.core().id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some(subscriber),
                collecting: true,
            });
        });

        Self { id }
    }

    /// Enter a non-collecting frame that keeps the current effect.
    pub fn pause() -> Self {
        let subscriber = Self::current_subscriber();
        let id = subscriber.as_ref().map(|subscriber| subscriber.core().id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                collecting: false,
            });
        });

        Self { id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The ID of the effect that is currently running, if any.
    pub fn current() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::id))
    }

    /// Whether a read right now would register a dependency.
    pub fn is_collecting() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.collecting && entry.subscriber.is_some())
        })
    }

    /// Whether the effect is anywhere on the chain of running effects.
    ///
    /// False once the thread's stack has been torn down, so effects dropped
    /// by other thread-local destructors can still stop cleanly.
    pub fn is_running(id: EffectId) -> bool {
        CONTEXT_STACK
            .try_with(|stack| {
                stack
                    .borrow()
                    .iter()
                    .rev()
                    .any(|entry| entry.id() == Some(id))
            })
            .unwrap_or(false)
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current_subscriber() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// The effect that should receive a dependency read right now.
    pub(crate) fn collecting_subscriber() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| entry.collecting)
                .and_then(|entry| entry.subscriber.clone())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.id(),
                self.id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.id,
                entry.id()
            );
        }
        // The popped frame may hold the last strong reference to an effect;
        // drop it only after the stack borrow is released.
        drop(popped);
    }
}

/// Run `f` without collecting dependencies.
///
/// Writes inside `f` still respect the self-trigger guard of the effect that
/// is running around it.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::pause();
    f()
}
