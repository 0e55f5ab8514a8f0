//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever reactive state it read
//! during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. Each run first leaves every dependency set the previous run joined,
//!    then runs the body inside a collecting context. Dependencies that are
//!    no longer read (a branch that was not taken this time) are dropped.
//!
//! 3. When a dependency changes, the effect's scheduler is called if it has
//!    one; otherwise the effect re-runs synchronously.
//!
//! # Re-entrancy
//!
//! A run that finds the effect already on the chain of running effects is
//! skipped and yields `None`. This is what keeps an effect that writes state
//! it also reads, or two effects that write each other's inputs, from
//! recursing without bound.
//!
//! # Stopping
//!
//! [`Effect::stop`] removes the effect from all its dependency sets and makes
//! it permanently inert as an observer. Called from inside the effect's own
//! body, the stop is deferred until the body returns. A stopped effect can
//! still be run by hand; it then executes its body without any tracking.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::debug;

use super::context::ReactiveContext;
use super::runtime::Dep;
use super::subscriber::{EffectId, Subscriber};
use crate::diagnostics::{self, Diagnostic};

/// Scheduler called instead of a direct re-run when a dependency changes.
pub type Scheduler = Rc<dyn Fn()>;

/// Options accepted by [`effect_with`] and [`Effect::with_options`].
#[derive(Default)]
pub struct EffectOptions {
    scheduler: Option<Scheduler>,
    lazy: bool,
    on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run; the first run happens on the first manual call.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Call `scheduler` on dependency changes instead of re-running.
    ///
    /// The scheduler decides whether and when to run the effect.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Callback invoked once when the effect is stopped.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }
}

impl std::fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Bookkeeping shared by all effects, independent of the body's type.
pub(crate) struct EffectCore {
    id: EffectId,

    /// Dependency sets joined during the last run.
    deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,

    /// Cleared permanently by `stop`.
    active: Cell<bool>,

    /// Set when `stop` is called while the body is running.
    defer_stop: Cell<bool>,

    scheduler: Option<Scheduler>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,

    /// Number of completed tracked runs.
    run_count: Cell<usize>,
}

impl EffectCore {
    fn new(scheduler: Option<Scheduler>, on_stop: Option<Box<dyn FnOnce()>>) -> Self {
        Self {
            id: EffectId::new(),
            deps: RefCell::new(SmallVec::new()),
            active: Cell::new(true),
            defer_stop: Cell::new(false),
            scheduler,
            on_stop: RefCell::new(on_stop),
            run_count: Cell::new(0),
        }
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    pub(crate) fn add_dep(&self, dep: &Rc<Dep>) {
        self.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    /// Leave every dependency set joined by the previous run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
    }

    fn dependency_count(&self) -> usize {
        self.deps
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|dep| dep.contains(self.id))
            .count()
    }
}

struct EffectInner<T> {
    core: EffectCore,
    body: Box<dyn Fn() -> T>,
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn rerun(self: Rc<Self>) {
        Effect { inner: self }.run();
    }
}

/// A computation that re-runs when the reactive state it read changes.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::from_json(json!({ "count": 0 }))?);
///
/// let logger = state.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", logger.get("count"));
/// });
///
/// state.set("count", 5);  // Prints: "Count is: 5"
/// ```
pub struct Effect<T: 'static> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create a new effect and run it immediately to establish dependencies.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(body, EffectOptions::new())
    }

    /// Create a new effect without running it.
    ///
    /// Dependencies are collected on the first call to [`Effect::run`].
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(body, EffectOptions::new().lazy(true))
    }

    pub fn with_options<F>(body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let EffectOptions {
            scheduler,
            lazy,
            on_stop,
        } = options;

        let effect = Self {
            inner: Rc::new(EffectInner {
                core: EffectCore::new(scheduler, on_stop),
                body: Box::new(body),
            }),
        };

        if !lazy {
            effect.run();
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.core.id
    }

    /// Run the body, collecting dependencies afresh.
    ///
    /// Returns `None` without running the body if this effect is already on
    /// the chain of running effects. A stopped effect runs its body without
    /// any dependency bookkeeping.
    pub fn run(&self) -> Option<T> {
        let core = &self.inner.core;
        if !core.active.get() {
            return Some((self.inner.body)());
        }

        if ReactiveContext::is_running(core.id) {
            diagnostics::report(Diagnostic::ReentrantEffectSkipped { effect: core.id });
            return None;
        }

        let guard = RunGuard::enter(self);
        core.cleanup();
        let result = (self.inner.body)();
        core.run_count.set(core.run_count.get() + 1);
        drop(guard);

        Some(result)
    }

    /// Stop the effect.
    ///
    /// After stopping, dependency changes no longer reach the effect. The
    /// on-stop callback runs once. Stopping from inside the effect's own
    /// body takes effect when the body returns.
    pub fn stop(&self) {
        let core = &self.inner.core;
        if ReactiveContext::is_running(core.id) {
            debug!(effect = ?core.id, "stop requested while running, deferring");
            core.defer_stop.set(true);
            return;
        }

        if core.active.get() {
            core.cleanup();
            core.active.set(false);
            let on_stop = core.on_stop.borrow_mut().take();
            if let Some(on_stop) = on_stop {
                on_stop();
            }
        }
    }

    /// Whether the effect still reacts to dependency changes.
    pub fn is_active(&self) -> bool {
        self.inner.core.active.get()
    }

    /// Get the number of completed tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.core.run_count.get()
    }

    /// Get the number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dependency_count()
    }

    /// Whether the effect uses a scheduler instead of direct re-runs.
    pub fn has_scheduler(&self) -> bool {
        self.inner.core.scheduler.is_some()
    }

    /// Whether both handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Scope of one tracked run.
///
/// Holds the context frame for the run; on drop (normal return or unwind)
/// pops it and then performs a stop that was deferred during the run.
struct RunGuard<'a, T: 'static> {
    effect: &'a Effect<T>,
    ctx: Option<ReactiveContext>,
}

impl<'a, T: 'static> RunGuard<'a, T> {
    fn enter(effect: &'a Effect<T>) -> Self {
        let subscriber: Rc<dyn Subscriber> = effect.inner.clone();
        Self {
            effect,
            ctx: Some(ReactiveContext::enter(subscriber)),
        }
    }
}

impl<T: 'static> Drop for RunGuard<'_, T> {
    fn drop(&mut self) {
        drop(self.ctx.take());
        if self.effect.inner.core.defer_stop.replace(false) {
            self.effect.stop();
        }
    }
}

/// Handle returned by [`effect`]: calling [`Runner::run`] re-runs the
/// effect, [`Runner::effect`] exposes it for stopping and inspection.
pub struct Runner<T: 'static> {
    effect: Effect<T>,
}

impl<T: 'static> Runner<T> {
    /// Run the effect now, regardless of any scheduler.
    pub fn run(&self) -> Option<T> {
        self.effect.run()
    }

    pub fn effect(&self) -> &Effect<T> {
        &self.effect
    }

    pub fn stop(&self) {
        self.effect.stop();
    }
}

impl<T: 'static> Clone for Runner<T> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Runner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Runner").field(&self.effect).finish()
    }
}

/// Create an effect that runs `body` now and again whenever what it read
/// changes.
pub fn effect<T, F>(body: F) -> Runner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with(body, EffectOptions::new())
}

/// Like [`effect`], with a scheduler, lazy start or on-stop callback.
pub fn effect_with<T, F>(body: F, options: EffectOptions) -> Runner<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Runner {
        effect: Effect::with_options(body, options),
    }
}

/// Stop the effect behind `runner`.
pub fn stop<T: 'static>(runner: &Runner<T>) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
