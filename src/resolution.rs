//! The resolution engine: global lock, dependency-chain tracking, and the
//! orchestration that turns a key plus a recipe into an instance.
//!
//! All process-wide mutable state lives in one [`EngineContext`] with a
//! documented init/reset lifecycle, rather than loose globals: the
//! reentrant resolution lock, the graph-depth counter, the diagnostic
//! dependency chain, and the strictness flags.

use std::any::Any;
use std::panic;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::key::FactoryKey;
use crate::registry::{AnyArc, AnyRecipe, ContainerManager};
use crate::scope::Scope;

#[cfg(debug_assertions)]
const MAX_DEPTH: usize = 1024;
const DEFAULT_CHAIN_TOLERANCE: usize = 1;

/// Panic payload raised on a detected circular dependency.
///
/// Carries the complete chain, e.g. `["A", "B", "C", "A"]`. Raised with
/// [`std::panic::panic_any`] so a test harness can catch and inspect the
/// fatal without crashing; engine state is reset before the panic so
/// subsequent resolutions start clean.
#[derive(Debug)]
pub struct CircularPanic {
    /// The ordered dependency chain ending in the repeated type.
    pub path: Box<[&'static str]>,
}

impl CircularPanic {
    /// Formats the chain as `A > B > C > A`.
    pub fn message(&self) -> String {
        self.path.join(" > ")
    }
}

struct EngineState {
    depth: usize,
    chain: Vec<&'static str>,
    chain_tolerance: usize,
    promised_strict: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            depth: 0,
            chain: Vec::new(),
            chain_tolerance: DEFAULT_CHAIN_TOLERANCE,
            promised_strict: false,
        }
    }
}

/// Process-wide engine state: the reentrant resolution lock plus the
/// diagnostic and policy flags shared by every container.
///
/// A single instance exists per process ([`EngineContext::global`]).
/// [`EngineContext::reset`] restores the initial state; tests use it to
/// isolate themselves after exercising fatal paths or strict mode.
pub struct EngineContext {
    lock: ReentrantMutex<()>,
    state: Mutex<EngineState>,
}

static ENGINE: Lazy<EngineContext> = Lazy::new(|| EngineContext {
    lock: ReentrantMutex::new(()),
    state: Mutex::new(EngineState::default()),
});

impl EngineContext {
    /// The process-wide engine context.
    pub fn global() -> &'static EngineContext {
        &ENGINE
    }

    /// Acquires the resolution lock. Reentrant: a recipe resolving nested
    /// dependencies on the same thread re-enters without deadlocking.
    pub(crate) fn acquire(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Strict mode makes resolving a promised-but-unregistered dependency
    /// fatal instead of yielding `None`. Process-global, not per-call.
    pub fn set_promised_strict(&self, strict: bool) {
        self.state.lock().promised_strict = strict;
    }

    pub fn promised_strict(&self) -> bool {
        self.state.lock().promised_strict
    }

    /// Sets how many prior occurrences of a type the dependency chain
    /// tolerates before declaring a cycle. The default of 1 means the
    /// second occurrence is fatal; raise it for legitimate
    /// repeated-but-terminating access patterns.
    pub fn set_chain_tolerance(&self, tolerance: usize) {
        self.state.lock().chain_tolerance = tolerance.max(1);
    }

    /// Restores defaults: zero depth, empty chain, default tolerance,
    /// lenient promised mode.
    pub fn reset(&self) {
        *self.state.lock() = EngineState::default();
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.state.lock().depth
    }
}

/// Guard for one level of resolution nesting.
///
/// Entering pushes the type onto the diagnostic chain (debug builds) and
/// bumps the graph depth; dropping pops and, when the depth returns to
/// zero, flushes the graph scope's private cache and clears the chain.
/// Drop-based so recipe panics unwind to a consistent state.
struct ResolutionFrame {
    #[cfg(debug_assertions)]
    chain_mark: usize,
}

impl ResolutionFrame {
    fn enter(name: &'static str) -> Self {
        let engine = EngineContext::global();
        let mut state = engine.state.lock();

        #[cfg(debug_assertions)]
        {
            let repeats = state.chain.iter().filter(|&&n| n == name).count();
            if repeats >= state.chain_tolerance {
                let mut path = state.chain.clone();
                path.push(name);
                // Reset tracking state before the fatal so the process
                // (or a test harness catching it) can continue.
                state.chain.clear();
                state.depth = 0;
                drop(state);
                Scope::graph().reset();
                panic::panic_any(CircularPanic {
                    path: path.into_boxed_slice(),
                });
            }
            if state.depth >= MAX_DEPTH {
                let depth = state.depth;
                state.chain.clear();
                state.depth = 0;
                drop(state);
                panic::panic_any(crate::error::DiError::DepthExceeded(depth));
            }
            state.chain.push(name);
        }
        #[cfg(not(debug_assertions))]
        let _ = name;

        state.depth += 1;

        Self {
            #[cfg(debug_assertions)]
            chain_mark: state.chain.len(),
        }
    }
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        let engine = EngineContext::global();
        let mut state = engine.state.lock();
        state.depth = state.depth.saturating_sub(1);

        #[cfg(debug_assertions)]
        {
            // Skip the pop when a fatal already cleared the chain.
            if self.chain_mark > 0 && state.chain.len() >= self.chain_mark {
                state.chain.truncate(self.chain_mark - 1);
            }
        }

        if state.depth == 0 {
            // End of one outward resolution: graph-scoped instances die and
            // the diagnostic chain is flushed.
            state.chain.clear();
            drop(state);
            Scope::graph().reset();
        }
    }
}

/// Orchestrates one resolution against a container.
///
/// Under the global lock: run the container's pending self-registration
/// hook, pick the effective recipe (context override > registration >
/// fallback), guard against cycles, resolve through the assigned scope's
/// cache, then let decorators observe the instance. Returns `None` only
/// when an option recipe produced an absent value.
pub(crate) fn resolve_erased(
    manager: &ContainerManager,
    key: &FactoryKey,
    fallback: &AnyRecipe,
    param: Box<dyn Any>,
    check: impl Fn(&AnyArc) -> bool,
) -> Option<AnyArc> {
    let engine = EngineContext::global();
    let _lock = engine.acquire();

    manager.run_auto_registration();

    let base = key.base();
    let plan = manager.plan(&base, fallback);

    let frame = ResolutionFrame::enter(key.display_name());

    let observing = manager.observers().is_active();
    let started = if observing {
        manager.observers().resolving(key);
        Some(Instant::now())
    } else {
        None
    };

    let recipe = plan.recipe;
    let produced = plan
        .scope
        .resolve(manager.cache(), key, plan.ttl, check, move || recipe(param));

    if let Some(started) = started {
        manager.observers().resolved(key, started.elapsed());
    }

    // Depth returns to zero (and the graph cache flushes) before the
    // decorators run, so a decorator's own resolutions count as new
    // outward cycles.
    drop(frame);

    if let Some(instance) = &produced {
        if let Some(decorator) = &plan.key_decorator {
            decorator(instance);
        }
        if let Some(decorator) = &plan.registry_decorator {
            decorator(instance);
        }
    }

    produced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_track_depth_and_flush_at_zero() {
        let engine = EngineContext::global();
        let _lock = engine.acquire();
        assert_eq!(engine.depth(), 0);

        {
            let _outer = ResolutionFrame::enter("depth_test::Outer");
            assert_eq!(engine.depth(), 1);
            {
                let _inner = ResolutionFrame::enter("depth_test::Inner");
                assert_eq!(engine.depth(), 2);
            }
            assert_eq!(engine.depth(), 1);
        }
        assert_eq!(engine.depth(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn repeated_type_trips_the_chain() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let engine = EngineContext::global();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _lock = engine.acquire();
            let _a = ResolutionFrame::enter("chain_test::A");
            let _b = ResolutionFrame::enter("chain_test::B");
            let _again = ResolutionFrame::enter("chain_test::A");
        }));

        let payload = outcome.expect_err("expected circular fatal");
        let circular = payload.downcast_ref::<CircularPanic>().expect("typed payload");
        assert_eq!(
            circular.message(),
            "chain_test::A > chain_test::B > chain_test::A"
        );
        // State was reset before the fatal.
        assert_eq!(engine.depth(), 0);
        engine.reset();
    }

    #[test]
    fn reset_restores_defaults() {
        let engine = EngineContext::global();
        engine.set_promised_strict(true);
        engine.set_chain_tolerance(5);
        engine.reset();
        assert!(!engine.promised_strict());
    }

    #[test]
    fn chain_tolerance_floor_is_one() {
        let engine = EngineContext::global();
        engine.set_chain_tolerance(0);
        assert_eq!(engine.state.lock().chain_tolerance, 1);
        engine.reset();
    }

    #[test]
    fn circular_message_formats_with_separators() {
        let circular = CircularPanic {
            path: vec!["A", "B", "A"].into_boxed_slice(),
        };
        assert_eq!(circular.message(), "A > B > A");
    }
}
