//! Factory handles: the public resolution and registration surface.
//!
//! A [`Factory`] is a lightweight handle naming one declared dependency.
//! Handles are rebuilt on every accessor call; the durable state
//! (registrations, options, cached instances) lives in the owning
//! container's manager, keyed by the factory's [`FactoryKey`].

use std::any::Any;
use std::hash::Hash;
use std::marker::PhantomData;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::context::ContextTag;
use crate::error::{DiError, DiResult};
use crate::key::{param_hash_of, FactoryKey};
use crate::options::ResetKind;
use crate::registry::{AnyArc, AnyDecorator, AnyRecipe, ContainerManager};
use crate::resolution::{resolve_erased, CircularPanic, EngineContext};
use crate::scope::Scope;

/// Type-erases a recipe producing `T` from parameter `P`.
fn erase<P, T>(recipe: impl Fn(P) -> T + Send + Sync + 'static) -> AnyRecipe
where
    P: 'static,
    T: Send + Sync + 'static,
{
    Arc::new(move |param: Box<dyn Any>| {
        let param = param.downcast::<P>().ok()?;
        Some(Arc::new(recipe(*param)) as AnyArc)
    })
}

/// Type-erases an optional recipe; `None` stays `None` so absent values
/// bypass the cache.
fn erase_optional<P, T>(recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static) -> AnyRecipe
where
    P: 'static,
    T: Send + Sync + 'static,
{
    Arc::new(move |param: Box<dyn Any>| {
        let param = param.downcast::<P>().ok()?;
        recipe(*param).map(|value| Arc::new(value) as AnyArc)
    })
}

/// Converts a caught resolution panic into a `DiError`, re-raising panics
/// the engine does not own.
fn map_resolution_panic(payload: Box<dyn Any + Send>) -> DiError {
    if let Some(circular) = payload.downcast_ref::<CircularPanic>() {
        DiError::Circular(circular.path.iter().copied().collect())
    } else if let Some(error) = payload.downcast_ref::<DiError>() {
        error.clone()
    } else {
        resume_unwind(payload)
    }
}

/// Handle for a declared dependency producing `T` from parameter `P`.
///
/// Obtained from [`Container::factory`](crate::Container::factory) (with
/// `P = ()`) or [`Container::parameterized`](crate::Container::parameterized).
/// All modifiers return `&Self` for chaining and silently respect a
/// [`once`](Factory::once) lock on structural options.
///
/// # Examples
///
/// ```rust
/// use forge_di::{Container, Scope};
/// use std::sync::Arc;
///
/// struct Service {
///     name: &'static str,
/// }
///
/// let container = Container::new();
/// let service = container.factory::<Service>("service", || Service { name: "real" });
/// service.scope(&Scope::cached());
///
/// let a = service.resolve();
/// assert_eq!(a.name, "real");
///
/// // Override the recipe at runtime; the cached instance is invalidated.
/// service.register(|_| Service { name: "mock" });
/// let b = service.resolve();
/// assert_eq!(b.name, "mock");
/// assert!(!Arc::ptr_eq(&a, &b));
/// ```
pub struct Factory<T, P = ()> {
    key: FactoryKey,
    manager: Arc<ContainerManager>,
    recipe: AnyRecipe,
    _marker: PhantomData<fn(P) -> T>,
}

impl<T, P> Clone for Factory<T, P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            manager: self.manager.clone(),
            recipe: self.recipe.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, P> Factory<T, P>
where
    T: Send + Sync + 'static,
    P: Hash + Send + 'static,
{
    pub(crate) fn new(
        key: FactoryKey,
        manager: Arc<ContainerManager>,
        recipe: impl Fn(P) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            manager,
            recipe: erase::<P, T>(recipe),
            _marker: PhantomData,
        }
    }

    /// This factory's base key.
    pub fn key(&self) -> FactoryKey {
        self.key
    }

    fn resolution_key(&self, param: &P) -> FactoryKey {
        match param_hash_of(param) {
            Some(hash) => self.key.with_param(hash),
            None => self.key,
        }
    }

    /// Resolves an instance for the given parameter.
    ///
    /// Applies the effective recipe (context override > registration >
    /// declared recipe) through the assigned scope's cache. Parameterized
    /// factories cache per distinct parameter.
    ///
    /// # Panics
    ///
    /// Panics on a detected circular dependency (debug builds; the payload
    /// is [`CircularPanic`]).
    pub fn resolve_with(&self, param: P) -> Arc<T> {
        let key = self.resolution_key(&param);
        let produced = resolve_erased(&self.manager, &key, &self.recipe, Box::new(param), |any| {
            any.as_ref().is::<T>()
        });
        match produced {
            Some(any) => any.downcast::<T>().unwrap_or_else(|_| {
                panic!(
                    "Failed to resolve {}: produced instance had the wrong type",
                    std::any::type_name::<T>()
                )
            }),
            None => panic!(
                "Failed to resolve {}: recipe produced no value",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Non-panicking resolution; circular dependencies and depth overruns
    /// surface as [`DiError`] values.
    pub fn try_resolve_with(&self, param: P) -> DiResult<Arc<T>> {
        match catch_unwind(AssertUnwindSafe(|| {
            let key = self.resolution_key(&param);
            resolve_erased(&self.manager, &key, &self.recipe, Box::new(param), |any| {
                any.as_ref().is::<T>()
            })
        })) {
            Ok(Some(any)) => any
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            Ok(None) => Err(DiError::NotRegistered(std::any::type_name::<T>())),
            Err(payload) => Err(map_resolution_panic(payload)),
        }
    }

    /// Replaces the construction recipe at runtime.
    ///
    /// The next resolution reflects the new recipe: any cached instance
    /// for this key is invalidated.
    pub fn register(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.manager.register(self.key, erase::<P, T>(recipe));
        self
    }

    /// Assigns the lifetime scope. Structural: ignored after `once()`.
    pub fn scope(&self, scope: &Scope) -> &Self {
        let scope = scope.clone();
        self.manager
            .mutate_options(self.key, true, move |options| options.scope = Some(scope));
        self
    }

    /// Caps how long a cached instance is served before the recipe is
    /// re-evaluated. Checked lazily on access, not by a timer. Structural:
    /// ignored after `once()`.
    pub fn time_to_live(&self, ttl: Duration) -> &Self {
        self.manager
            .mutate_options(self.key, true, move |options| options.ttl = Some(ttl));
        self
    }

    /// Installs a callback observing every instance this factory resolves,
    /// after construction and caching. Decorators perform side-effecting
    /// setup; they cannot substitute the instance. Structural: ignored
    /// after `once()`.
    pub fn decorator(&self, decorator: impl Fn(&Arc<T>) + Send + Sync + 'static) -> &Self {
        let erased: AnyDecorator = Arc::new(move |any: &AnyArc| {
            if let Ok(typed) = any.clone().downcast::<T>() {
                decorator(&typed);
            }
        });
        self.manager
            .mutate_options(self.key, true, move |options| options.decorator = Some(erased));
        self
    }

    /// Registers a recipe that applies only under the given runtime
    /// context. Context overrides layer on top of a once-locked key.
    pub fn on_context(&self, tag: ContextTag, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        let erased = erase::<P, T>(recipe);
        self.manager
            .mutate_options(self.key, false, move |options| options.set_override(tag, erased));
        self
    }

    /// Recipe used while the named launch argument is active.
    pub fn on_arg(&self, name: impl Into<String>, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Arg(name.into()), recipe)
    }

    /// Recipe used in preview mode.
    pub fn on_preview(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Preview, recipe)
    }

    /// Recipe used in test mode.
    pub fn on_test(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Test, recipe)
    }

    /// Recipe used on a simulator.
    pub fn on_simulator(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Simulator, recipe)
    }

    /// Recipe used on a physical device.
    pub fn on_device(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Device, recipe)
    }

    /// Recipe used in debug builds.
    pub fn on_debug(&self, recipe: impl Fn(P) -> T + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Debug, recipe)
    }

    /// Locks the structural options (scope, TTL, decorator) in place:
    /// later structural mutations are silently ignored until the key is
    /// fully reset. Context overrides and `register` still apply.
    pub fn once(&self) -> &Self {
        self.manager.lock_once(self.key);
        self
    }

    /// Per-key reset at the chosen granularity. `ResetKind::All` also
    /// releases a `once()` lock.
    pub fn reset(&self, kind: ResetKind) -> &Self {
        self.manager.reset_key(&self.key, kind);
        self
    }
}

impl<T> Factory<T, ()>
where
    T: Send + Sync + 'static,
{
    /// Resolves an instance of `T`.
    pub fn resolve(&self) -> Arc<T> {
        self.resolve_with(())
    }

    /// Non-panicking resolution.
    pub fn try_resolve(&self) -> DiResult<Arc<T>> {
        self.try_resolve_with(())
    }
}

/// Handle for a dependency whose recipe may produce nothing.
///
/// Covers two cases from the same contract: recipes genuinely returning
/// `Option<T>`, and *promised* dependencies declared before any recipe
/// exists ([`Container::promised`](crate::Container::promised)). Absent
/// results are never cached, so consumers see the live result of
/// re-evaluating the recipe until a real value is registered.
///
/// # Examples
///
/// ```rust
/// use forge_di::Container;
///
/// struct Analytics {
///     endpoint: String,
/// }
///
/// let container = Container::new();
/// let analytics = container.promised::<Analytics>("analytics");
/// assert!(analytics.resolve().is_none());
///
/// analytics.register(|_| {
///     Some(Analytics {
///         endpoint: "https://example.com".to_string(),
///     })
/// });
/// assert!(analytics.resolve().is_some());
/// ```
pub struct OptionFactory<T, P = ()> {
    key: FactoryKey,
    manager: Arc<ContainerManager>,
    recipe: AnyRecipe,
    _marker: PhantomData<fn(P) -> T>,
}

impl<T, P> Clone for OptionFactory<T, P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            manager: self.manager.clone(),
            recipe: self.recipe.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, P> OptionFactory<T, P>
where
    T: Send + Sync + 'static,
    P: Hash + Send + 'static,
{
    pub(crate) fn new(
        key: FactoryKey,
        manager: Arc<ContainerManager>,
        recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            manager,
            recipe: erase_optional::<P, T>(recipe),
            _marker: PhantomData,
        }
    }

    /// Declares a dependency with no recipe yet. Resolution yields `None`
    /// until one is registered, or panics naming the type when the engine
    /// is in strict promised mode.
    pub(crate) fn promised(key: FactoryKey, manager: Arc<ContainerManager>) -> Self {
        let recipe: AnyRecipe = Arc::new(move |_param| {
            if EngineContext::global().promised_strict() {
                panic!(
                    "promised dependency {} was not registered",
                    std::any::type_name::<T>()
                );
            }
            None
        });
        Self {
            key,
            manager,
            recipe,
            _marker: PhantomData,
        }
    }

    /// This factory's base key.
    pub fn key(&self) -> FactoryKey {
        self.key
    }

    fn resolution_key(&self, param: &P) -> FactoryKey {
        match param_hash_of(param) {
            Some(hash) => self.key.with_param(hash),
            None => self.key,
        }
    }

    /// Resolves an instance, or `None` while the recipe produces nothing.
    pub fn resolve_with(&self, param: P) -> Option<Arc<T>> {
        let key = self.resolution_key(&param);
        let produced = resolve_erased(&self.manager, &key, &self.recipe, Box::new(param), |any| {
            any.as_ref().is::<T>()
        })?;
        Some(produced.downcast::<T>().unwrap_or_else(|_| {
            panic!(
                "Failed to resolve {}: produced instance had the wrong type",
                std::any::type_name::<T>()
            )
        }))
    }

    /// Non-panicking resolution; `Ok(None)` is the absent-value case.
    pub fn try_resolve_with(&self, param: P) -> DiResult<Option<Arc<T>>> {
        match catch_unwind(AssertUnwindSafe(|| {
            let key = self.resolution_key(&param);
            resolve_erased(&self.manager, &key, &self.recipe, Box::new(param), |any| {
                any.as_ref().is::<T>()
            })
        })) {
            Ok(Some(any)) => any
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            Ok(None) => Ok(None),
            Err(payload) => Err(map_resolution_panic(payload)),
        }
    }

    /// Replaces the construction recipe, invalidating any cached instance.
    pub fn register(&self, recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static) -> &Self {
        self.manager.register(self.key, erase_optional::<P, T>(recipe));
        self
    }

    /// Assigns the lifetime scope. Structural: ignored after `once()`.
    pub fn scope(&self, scope: &Scope) -> &Self {
        let scope = scope.clone();
        self.manager
            .mutate_options(self.key, true, move |options| options.scope = Some(scope));
        self
    }

    /// Lazily-checked cache lifetime. Structural: ignored after `once()`.
    pub fn time_to_live(&self, ttl: Duration) -> &Self {
        self.manager
            .mutate_options(self.key, true, move |options| options.ttl = Some(ttl));
        self
    }

    /// Observes resolved instances. Structural: ignored after `once()`.
    pub fn decorator(&self, decorator: impl Fn(&Arc<T>) + Send + Sync + 'static) -> &Self {
        let erased: AnyDecorator = Arc::new(move |any: &AnyArc| {
            if let Ok(typed) = any.clone().downcast::<T>() {
                decorator(&typed);
            }
        });
        self.manager
            .mutate_options(self.key, true, move |options| options.decorator = Some(erased));
        self
    }

    /// Context-conditional recipe; applies even on a once-locked key.
    pub fn on_context(
        &self,
        tag: ContextTag,
        recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static,
    ) -> &Self {
        let erased = erase_optional::<P, T>(recipe);
        self.manager
            .mutate_options(self.key, false, move |options| options.set_override(tag, erased));
        self
    }

    /// Recipe used while the named launch argument is active.
    pub fn on_arg(
        &self,
        name: impl Into<String>,
        recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static,
    ) -> &Self {
        self.on_context(ContextTag::Arg(name.into()), recipe)
    }

    /// Recipe used in test mode.
    pub fn on_test(&self, recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Test, recipe)
    }

    /// Recipe used in preview mode.
    pub fn on_preview(&self, recipe: impl Fn(P) -> Option<T> + Send + Sync + 'static) -> &Self {
        self.on_context(ContextTag::Preview, recipe)
    }

    /// Locks structural options; see [`Factory::once`].
    pub fn once(&self) -> &Self {
        self.manager.lock_once(self.key);
        self
    }

    /// Per-key reset at the chosen granularity.
    pub fn reset(&self, kind: ResetKind) -> &Self {
        self.manager.reset_key(&self.key, kind);
        self
    }
}

impl<T> OptionFactory<T, ()>
where
    T: Send + Sync + 'static,
{
    /// Resolves an instance, or `None` while absent.
    pub fn resolve(&self) -> Option<Arc<T>> {
        self.resolve_with(())
    }

    /// Non-panicking resolution.
    pub fn try_resolve(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_with(())
    }
}
