//! Containers: named collections of related recipes sharing one registry.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::factory::{Factory, OptionFactory};
use crate::key::FactoryKey;
use crate::observer::ResolutionObserver;
use crate::options::ResetKind;
use crate::registry::{AnyArc, ContainerManager};
use crate::scope::Scope;

static SHARED: Lazy<Container> = Lazy::new(|| Container::named("shared"));

/// A named collection of recipes backed by one [`ContainerManager`].
///
/// Containers are independent address spaces: the same declarations made
/// against two containers hold separate registrations, options and cached
/// instances. Clones share the underlying manager.
///
/// Consumers typically expose accessors through an extension trait:
///
/// ```rust
/// use forge_di::{Container, Factory, Scope};
///
/// struct Database {
///     url: String,
/// }
///
/// trait AppServices {
///     fn database(&self) -> Factory<Database>;
/// }
///
/// impl AppServices for Container {
///     fn database(&self) -> Factory<Database> {
///         let f = self.factory("database", || Database {
///             url: "postgres://localhost".to_string(),
///         });
///         f.scope(&Scope::cached());
///         f
///     }
/// }
///
/// let db = Container::shared().database().resolve();
/// assert_eq!(db.url, "postgres://localhost");
/// ```
pub struct Container {
    name: &'static str,
    manager: Arc<ContainerManager>,
}

impl Container {
    /// Creates an independent, unnamed container.
    pub fn new() -> Self {
        Self::named("container")
    }

    /// Creates an independent container with a diagnostic name. The name
    /// participates in key identity, so distinctly named containers never
    /// collide in the process-wide singleton store.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            manager: Arc::new(ContainerManager::new()),
        }
    }

    /// The process-wide default container.
    pub fn shared() -> &'static Container {
        &SHARED
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declares a dependency producing `T`, identified by this container
    /// and the declaration-site tag.
    pub fn factory<T>(
        &self,
        site: &'static str,
        recipe: impl Fn() -> T + Send + Sync + 'static,
    ) -> Factory<T>
    where
        T: Send + Sync + 'static,
    {
        let key = FactoryKey::new::<T>(self.name, site);
        Factory::new(key, self.manager.clone(), move |_: ()| recipe())
    }

    /// Declares a parameterized dependency: each distinct parameter value
    /// resolves and caches independently.
    pub fn parameterized<T, P>(
        &self,
        site: &'static str,
        recipe: impl Fn(P) -> T + Send + Sync + 'static,
    ) -> Factory<T, P>
    where
        T: Send + Sync + 'static,
        P: Hash + Send + 'static,
    {
        let key = FactoryKey::new::<T>(self.name, site);
        Factory::new(key, self.manager.clone(), recipe)
    }

    /// Declares a dependency whose recipe may produce nothing; absent
    /// results are never cached.
    pub fn optional<T>(
        &self,
        site: &'static str,
        recipe: impl Fn() -> Option<T> + Send + Sync + 'static,
    ) -> OptionFactory<T>
    where
        T: Send + Sync + 'static,
    {
        let key = FactoryKey::new::<T>(self.name, site);
        OptionFactory::new(key, self.manager.clone(), move |_: ()| recipe())
    }

    /// Declares a dependency with no recipe yet. Resolves to `None` (or
    /// fatally, in strict promised mode) until a recipe is registered.
    pub fn promised<T>(&self, site: &'static str) -> OptionFactory<T>
    where
        T: Send + Sync + 'static,
    {
        let key = FactoryKey::new::<T>(self.name, site);
        OptionFactory::promised(key, self.manager.clone())
    }

    /// Container-wide reset at the chosen granularity. The singleton
    /// scope's private store is never touched; reset it explicitly with
    /// `Scope::singleton().reset()`.
    pub fn reset(&self, kind: ResetKind) {
        self.manager.reset(kind);
    }

    /// Saves the container's registrations, options, and cached instances
    /// for later [`pop`](Container::pop) restoration. Intended for test
    /// isolation.
    pub fn push(&self) {
        self.manager.push();
    }

    /// Restores the most recent [`push`](Container::push) snapshot; no-op
    /// with nothing pushed.
    pub fn pop(&self) {
        self.manager.pop();
    }

    /// Clears only the cached instances stored under the given scope's
    /// identity, leaving other scopes' entries intact.
    pub fn reset_scope(&self, scope: &Scope) {
        self.manager.reset_scope(scope);
    }

    /// Scope applied to factories that never had one assigned. Without a
    /// default, unassigned factories resolve uniquely.
    pub fn set_default_scope(&self, scope: &Scope) {
        self.manager.set_default_scope(scope.clone());
    }

    /// Installs a registry-wide decorator observing every instance this
    /// container resolves, after any key-specific decorator.
    pub fn decorator(&self, decorator: impl Fn(&(dyn Any + Send + Sync)) + Send + Sync + 'static) {
        self.manager
            .set_decorator(Arc::new(move |any: &AnyArc| decorator(any.as_ref())));
    }

    /// Arms a hook that runs exactly once, before the first resolution
    /// against this container. Registrations made inside the hook skip
    /// per-key cache invalidation.
    pub fn set_auto_register(&self, hook: impl FnOnce(&Container) + Send + 'static) {
        let container = self.clone();
        self.manager
            .set_auto_register(Box::new(move || hook(&container)));
    }

    /// Adds a resolution observer.
    pub fn add_observer(&self, observer: Arc<dyn ResolutionObserver>) {
        self.manager.add_observer(observer);
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        self.manager.debug_string(self.name)
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            manager: self.manager.clone(),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn containers_are_independent() {
        let a = Container::named("indep_a");
        let b = Container::named("indep_b");

        let fa = a.factory::<u32>("value", || 1);
        let fb = b.factory::<u32>("value", || 1);
        fa.register(|_| 2);

        assert_eq!(*fa.resolve(), 2);
        assert_eq!(*fb.resolve(), 1);
    }

    #[test]
    fn clones_share_state() {
        let a = Container::named("clone_share");
        let b = a.clone();

        a.factory::<u32>("value", || 1).register(|_| 5);
        assert_eq!(*b.factory::<u32>("value", || 1).resolve(), 5);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn debug_dump_lists_registrations_and_options() {
        let container = Container::named("diag_dump");
        let service = container.factory::<u32>("service", || 1);
        service.scope(&crate::Scope::cached());
        service.register(|_| 2);
        let _ = service.resolve();

        let dump = container.to_debug_string();
        assert!(dump.contains("diag_dump"));
        assert!(dump.contains("u32 @ service"));
        assert!(dump.contains("scope=Some(\"cached\")"));
    }

    #[test]
    fn auto_register_runs_once_before_first_resolution() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);

        let container = Container::named("auto_reg");
        container.set_auto_register(|c| {
            RUNS.fetch_add(1, Ordering::SeqCst);
            c.factory::<u32>("value", || 0).register(|_| 42);
        });

        let value = container.factory::<u32>("value", || 0);
        assert_eq!(*value.resolve(), 42);
        assert_eq!(*value.resolve(), 42);
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    }
}
