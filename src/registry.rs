//! Container-level registration and options storage.
//!
//! A [`ContainerManager`] owns everything one container mutates at
//! runtime: the recipe-override table, the per-key options table, the
//! default instance cache, and the snapshot stack used for test isolation.
//! All sections are short; the global resolution lock serializes callers,
//! so the inner locks exist to satisfy `Sync`, never to arbitrate.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{CacheBox, ScopeCache};
use crate::context::{select_override, RuntimeContext};
use crate::key::FactoryKey;
use crate::observer::Observers;
use crate::options::{FactoryOptions, ResetKind};
use crate::resolution::EngineContext;
use crate::scope::Scope;

/// Type-erased Arc for instance storage.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased construction recipe: parameter in, optional instance out.
/// Recipes producing `None` model absent optional values, which are never
/// cached.
pub(crate) type AnyRecipe = Arc<dyn Fn(Box<dyn Any>) -> Option<AnyArc> + Send + Sync>;

/// Type-erased decorator observing a constructed instance. Decorators may
/// perform setup side effects but never substitute the instance.
pub(crate) type AnyDecorator = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// Everything the engine needs to run one resolution, computed under a
/// single state lock.
pub(crate) struct ResolutionPlan {
    pub(crate) recipe: AnyRecipe,
    pub(crate) scope: Scope,
    pub(crate) ttl: Option<Duration>,
    pub(crate) key_decorator: Option<AnyDecorator>,
    pub(crate) registry_decorator: Option<AnyDecorator>,
}

struct Snapshot {
    registrations: HashMap<FactoryKey, AnyRecipe>,
    options: HashMap<FactoryKey, FactoryOptions>,
    cache: HashMap<FactoryKey, CacheBox>,
}

#[derive(Default)]
struct ManagerState {
    registrations: HashMap<FactoryKey, AnyRecipe>,
    options: HashMap<FactoryKey, FactoryOptions>,
    stack: Vec<Snapshot>,
    auto_register: Option<Box<dyn FnOnce() + Send>>,
    /// Suppresses cache invalidation during the auto-registration pass.
    registering: bool,
    default_scope: Option<Scope>,
    decorator: Option<AnyDecorator>,
}

/// Per-container registry: recipe overrides, options, default cache,
/// snapshot stack, and the pending self-registration hook.
pub struct ContainerManager {
    state: Mutex<ManagerState>,
    cache: ScopeCache,
    observers: Observers,
}

impl ContainerManager {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState::default()),
            cache: ScopeCache::default(),
            observers: Observers::default(),
        }
    }

    pub(crate) fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    /// Stores a recipe override and invalidates the key's cached
    /// instances so the next resolution observes the new recipe. The
    /// invalidation is suppressed while the auto-registration pass runs.
    ///
    /// Runs under the global resolution lock: the insert and the cache
    /// invalidation are atomic with respect to concurrent resolutions.
    pub(crate) fn register(&self, base: FactoryKey, recipe: AnyRecipe) {
        let _lock = EngineContext::global().acquire();
        let suppress = {
            let mut state = self.state.lock();
            state.registrations.insert(base, recipe);
            state.registering
        };
        if !suppress {
            self.invalidate(&base);
        }
    }

    /// Drops a key's cached instances everywhere they may live: the
    /// container's default cache plus the private singleton and graph
    /// stores.
    pub(crate) fn invalidate(&self, base: &FactoryKey) {
        self.cache.remove_base(base);
        Scope::singleton().remove_base(base);
        Scope::graph().remove_base(base);
    }

    /// Computes the effective recipe and policies for one resolution.
    ///
    /// Recipe precedence, highest first: active context override,
    /// explicit registration, declared fallback.
    pub(crate) fn plan(&self, base: &FactoryKey, fallback: &AnyRecipe) -> ResolutionPlan {
        let ctx = RuntimeContext::snapshot();
        let state = self.state.lock();
        let options = state.options.get(base);

        let recipe = options
            .and_then(|o| select_override(&ctx, &o.overrides))
            .cloned()
            .or_else(|| state.registrations.get(base).cloned())
            .unwrap_or_else(|| fallback.clone());

        let scope = options
            .and_then(|o| o.scope.clone())
            .or_else(|| state.default_scope.clone())
            .unwrap_or_else(Scope::unique);

        ResolutionPlan {
            recipe,
            scope,
            ttl: options.and_then(|o| o.ttl),
            key_decorator: options.and_then(|o| o.decorator.clone()),
            registry_decorator: state.decorator.clone(),
        }
    }

    /// Applies a mutation to a key's options.
    ///
    /// Structural mutations (scope, TTL, decorator) are silently ignored
    /// once the key is once-locked; the first writer wins. Context
    /// overrides pass `structural = false` and always apply.
    pub(crate) fn mutate_options(
        &self,
        base: FactoryKey,
        structural: bool,
        mutation: impl FnOnce(&mut FactoryOptions),
    ) {
        let _lock = EngineContext::global().acquire();
        let mut state = self.state.lock();
        let options = state.options.entry(base).or_default();
        if structural && options.once {
            #[cfg(feature = "diagnostics")]
            eprintln!(
                "[forge-di] ignoring modification of once-locked factory {}",
                base.display_name()
            );
            return;
        }
        mutation(options);
    }

    /// Locks a key's structural options in place. Idempotent; a second
    /// once-call on a locked key is itself a rejected structural mutation.
    pub(crate) fn lock_once(&self, base: FactoryKey) {
        let _lock = EngineContext::global().acquire();
        let mut state = self.state.lock();
        let options = state.options.entry(base).or_default();
        if options.once {
            #[cfg(feature = "diagnostics")]
            eprintln!(
                "[forge-di] ignoring repeated once() on locked factory {}",
                base.display_name()
            );
            return;
        }
        options.once = true;
    }

    pub(crate) fn set_default_scope(&self, scope: Scope) {
        self.state.lock().default_scope = Some(scope);
    }

    pub(crate) fn set_decorator(&self, decorator: AnyDecorator) {
        self.state.lock().decorator = Some(decorator);
    }

    pub(crate) fn add_observer(&self, observer: Arc<dyn crate::observer::ResolutionObserver>) {
        self.observers.add(observer);
    }

    /// Arms the container's one-time self-registration hook.
    pub(crate) fn set_auto_register(&self, hook: Box<dyn FnOnce() + Send>) {
        self.state.lock().auto_register = Some(hook);
    }

    /// Runs the pending self-registration hook, if any, exactly once.
    ///
    /// Called by the engine before every resolution under the global lock;
    /// the taken hook guarantees single execution even when the first
    /// resolutions race. Registrations made by the hook skip cache
    /// invalidation to avoid needless churn.
    pub(crate) fn run_auto_registration(&self) {
        let hook = {
            let mut state = self.state.lock();
            match state.auto_register.take() {
                Some(hook) => {
                    state.registering = true;
                    hook
                }
                None => return,
            }
        };

        // Clear the suppression flag even if the hook panics.
        struct ClearRegistering<'a>(&'a ContainerManager);
        impl Drop for ClearRegistering<'_> {
            fn drop(&mut self) {
                self.0.state.lock().registering = false;
            }
        }
        let _clear = ClearRegistering(self);
        hook();
    }

    /// Container-wide reset. Never touches the singleton scope's private
    /// store; that requires an explicit `Scope::singleton().reset()`.
    pub(crate) fn reset(&self, kind: ResetKind) {
        let _lock = EngineContext::global().acquire();
        match kind {
            ResetKind::All => {
                let mut state = self.state.lock();
                state.registrations.clear();
                state.options.clear();
                drop(state);
                self.cache.clear();
            }
            ResetKind::Registration => {
                let bases: Vec<FactoryKey> = {
                    let mut state = self.state.lock();
                    let bases = state.registrations.keys().copied().collect();
                    state.registrations.clear();
                    bases
                };
                for base in &bases {
                    self.invalidate(base);
                }
            }
            ResetKind::Scope => {
                self.cache.clear();
            }
            ResetKind::Context => {
                let mut state = self.state.lock();
                for options in state.options.values_mut() {
                    options.overrides.clear();
                }
            }
            ResetKind::None => {}
        }
    }

    /// Per-key reset. `ResetKind::All` also clears the once lock.
    pub(crate) fn reset_key(&self, base: &FactoryKey, kind: ResetKind) {
        let _lock = EngineContext::global().acquire();
        match kind {
            ResetKind::All => {
                let mut state = self.state.lock();
                state.registrations.remove(base);
                state.options.remove(base);
                drop(state);
                self.invalidate(base);
            }
            ResetKind::Registration => {
                self.state.lock().registrations.remove(base);
                self.invalidate(base);
            }
            ResetKind::Scope => {
                self.invalidate(base);
            }
            ResetKind::Context => {
                let mut state = self.state.lock();
                if let Some(options) = state.options.get_mut(base) {
                    options.overrides.clear();
                }
            }
            ResetKind::None => {}
        }
    }

    /// Clears the default cache's entries stored under the given scope's
    /// identity; private-cache scopes clear their own store.
    pub(crate) fn reset_scope(&self, scope: &Scope) {
        let _lock = EngineContext::global().acquire();
        if scope.has_private_storage() {
            scope.reset();
        } else {
            self.cache.clear_scope(scope.id());
        }
    }

    /// Saves the full mutable state for later `pop` restoration.
    pub(crate) fn push(&self) {
        let _lock = EngineContext::global().acquire();
        let mut state = self.state.lock();
        let snapshot = Snapshot {
            registrations: state.registrations.clone(),
            options: state.options.clone(),
            cache: self.cache.snapshot(),
        };
        state.stack.push(snapshot);
    }

    /// Restores the most recent snapshot; no-op with nothing pushed.
    pub(crate) fn pop(&self) {
        let _lock = EngineContext::global().acquire();
        let snapshot = self.state.lock().stack.pop();
        if let Some(snapshot) = snapshot {
            let mut state = self.state.lock();
            state.registrations = snapshot.registrations;
            state.options = snapshot.options;
            drop(state);
            self.cache.restore(snapshot.cache);
        }
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn debug_string(&self, container_name: &str) -> String {
        let state = self.state.lock();
        let mut out = format!("=== Container '{}' ===\n", container_name);
        out.push_str("Registrations:\n");
        for key in state.registrations.keys() {
            out.push_str(&format!("  {} @ {}\n", key.display_name(), key.site()));
        }
        out.push_str("Options:\n");
        for (key, options) in &state.options {
            out.push_str(&format!(
                "  {} @ {}: scope={:?} ttl={:?} overrides={} once={}\n",
                key.display_name(),
                key.site(),
                options.scope.as_ref().map(Scope::name),
                options.ttl,
                options.overrides.len(),
                options.once,
            ));
        }
        out.push_str(&format!("Cached instances: {}\n", self.cache.len()));
        out
    }
}
