//! Lifetime scopes controlling instance caching behavior.
//!
//! A scope decides, for one resolution, whether the cache is consulted and
//! which physical cache holds the boxed instance:
//!
//! - [`Scope::unique`] — no caching, a fresh instance per resolution
//! - [`Scope::cached`] — the owning container's cache, until reset
//! - [`Scope::graph`] — a private cache living for one outward resolution
//! - [`Scope::shared`] — the container's cache, weakly boxed
//! - [`Scope::singleton`] — a private process-wide cache that survives
//!   container resets
//! - [`Scope::custom`] — user-defined cached-flavored scopes with their own
//!   identity, resettable independently
//!
//! The five built-ins are process-wide singletons created once at first
//! use; custom scopes are minted on demand and live as long as some
//! registration references them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::cache::{CacheBox, ScopeCache};
use crate::key::FactoryKey;
use crate::registry::AnyArc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a scope, used to tag cache entries for selective clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

enum Boxing {
    Strong,
    Weak,
}

enum Storage {
    /// Never caches (Unique).
    None,
    /// Uses the owning container's default cache, tagged with this scope's id.
    Registry,
    /// Owns a private cache independent of any container (Graph, Singleton).
    Private(ScopeCache),
}

struct ScopeInner {
    id: ScopeId,
    name: &'static str,
    boxing: Boxing,
    storage: Storage,
}

/// A named lifetime policy applied to a factory's results.
///
/// Scopes are cheap cloneable handles; clones share identity. Equality is
/// identity equality.
///
/// # Examples
///
/// ```rust
/// use forge_di::{Container, Scope};
/// use std::sync::Arc;
///
/// let container = Container::new();
/// let service = container.factory::<String>("service", || "hello".to_string());
/// service.scope(&Scope::cached());
///
/// let a = service.resolve();
/// let b = service.resolve();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

static UNIQUE: Lazy<Scope> = Lazy::new(|| Scope::build("unique", Boxing::Strong, Storage::None));
static CACHED: Lazy<Scope> = Lazy::new(|| Scope::build("cached", Boxing::Strong, Storage::Registry));
static GRAPH: Lazy<Scope> =
    Lazy::new(|| Scope::build("graph", Boxing::Strong, Storage::Private(ScopeCache::default())));
static SHARED: Lazy<Scope> = Lazy::new(|| Scope::build("shared", Boxing::Weak, Storage::Registry));
static SINGLETON: Lazy<Scope> = Lazy::new(|| {
    Scope::build("singleton", Boxing::Strong, Storage::Private(ScopeCache::default()))
});

impl Scope {
    fn build(name: &'static str, boxing: Boxing, storage: Storage) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::next(),
                name,
                boxing,
                storage,
            }),
        }
    }

    /// Always invokes the recipe; never touches a cache.
    pub fn unique() -> Scope {
        UNIQUE.clone()
    }

    /// Caches in the owning container until the container or the entry is
    /// reset.
    pub fn cached() -> Scope {
        CACHED.clone()
    }

    /// Caches for the duration of one outward resolution: nested requests
    /// for the same key share one instance, separate outward resolutions
    /// produce new ones. The engine flushes this scope's cache whenever the
    /// resolution depth returns to zero.
    pub fn graph() -> Scope {
        GRAPH.clone()
    }

    /// Like cached, but boxes weakly: the instance survives only while some
    /// caller retains the returned `Arc`. Once the last external handle is
    /// dropped the next resolution is a miss and produces a fresh instance.
    pub fn shared() -> Scope {
        SHARED.clone()
    }

    /// Caches in a private process-wide store independent of any container,
    /// so container resets never clear it. `Scope::singleton().reset()` is
    /// the explicit global reset.
    pub fn singleton() -> Scope {
        SINGLETON.clone()
    }

    /// Mints a user-defined scope with cached semantics and its own
    /// identity, so it can be reset independently of other scopes sharing
    /// the container's storage.
    pub fn custom(name: &'static str) -> Scope {
        Scope::build(name, Boxing::Strong, Storage::Registry)
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Clears this scope's private cache.
    ///
    /// Registry-backed scopes (cached, shared, custom) keep their entries
    /// in the owning container; reset those through
    /// [`Container::reset_scope`](crate::Container::reset_scope).
    pub fn reset(&self) {
        if let Storage::Private(cache) = &self.inner.storage {
            let _lock = crate::resolution::EngineContext::global().acquire();
            cache.clear();
        }
    }

    pub(crate) fn has_private_storage(&self) -> bool {
        matches!(self.inner.storage, Storage::Private(_))
    }

    /// Drops every parameterization of a recipe from a private cache.
    /// No-op for registry-backed scopes (the container handles those).
    pub(crate) fn remove_base(&self, base: &FactoryKey) {
        if let Storage::Private(cache) = &self.inner.storage {
            cache.remove_base(base);
        }
    }

    /// Check-cache, invoke, box, store.
    ///
    /// Absent produced values (`None` from an option recipe) are never
    /// stored: consumers see the live result of re-evaluating the recipe
    /// until a real value appears.
    pub(crate) fn resolve(
        &self,
        registry_cache: &ScopeCache,
        key: &FactoryKey,
        ttl: Option<Duration>,
        check: impl Fn(&AnyArc) -> bool,
        make: impl FnOnce() -> Option<AnyArc>,
    ) -> Option<AnyArc> {
        let cache = match &self.inner.storage {
            Storage::None => return make(),
            Storage::Registry => registry_cache,
            Storage::Private(private) => private,
        };

        if let Some(hit) = cache.get(key, ttl, &check) {
            return Some(hit);
        }

        let produced = make()?;
        let boxed = match self.inner.boxing {
            Boxing::Strong => CacheBox::strong(produced.clone(), self.inner.id),
            Boxing::Weak => CacheBox::weak(&produced, self.inner.id),
        };
        cache.set(*key, boxed);
        Some(produced)
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .finish()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner.name)
    }
}
