//! Instance cache shared by the lifetime scopes.
//!
//! A [`ScopeCache`] maps factory keys to boxed instances. Entries are
//! tagged with the [`ScopeId`] that stored them so one named scope can be
//! reset without disturbing other scopes sharing the same physical storage.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::key::FactoryKey;
use crate::registry::AnyArc;
use crate::scope::ScopeId;

/// A produced instance held by the cache, strongly or weakly.
#[derive(Clone)]
pub(crate) enum Boxed {
    /// Owns the value for the cache's lifetime.
    Strong(AnyArc),
    /// Non-owning back-reference; valid only while an external owner keeps
    /// the value alive.
    Weak(Weak<dyn Any + Send + Sync>),
}

/// Cache entry wrapping a produced instance plus scope tag and timestamp.
#[derive(Clone)]
pub(crate) struct CacheBox {
    boxed: Boxed,
    scope: ScopeId,
    created: Instant,
}

impl CacheBox {
    pub(crate) fn strong(value: AnyArc, scope: ScopeId) -> Self {
        Self {
            boxed: Boxed::Strong(value),
            scope,
            created: Instant::now(),
        }
    }

    pub(crate) fn weak(value: &AnyArc, scope: ScopeId) -> Self {
        Self {
            boxed: Boxed::Weak(Arc::downgrade(value)),
            scope,
            created: Instant::now(),
        }
    }

    fn expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.created.elapsed() > ttl,
            None => false,
        }
    }

    fn instance(&self) -> Option<AnyArc> {
        match &self.boxed {
            Boxed::Strong(value) => Some(value.clone()),
            Boxed::Weak(weak) => weak.upgrade(),
        }
    }
}

/// Keyed instance storage with TTL, weak-liveness and downcast checking.
///
/// All operations take the internal lock for the duration of one map
/// access; the global resolution lock already serializes callers, so these
/// sections never contend.
#[derive(Default)]
pub(crate) struct ScopeCache {
    entries: Mutex<HashMap<FactoryKey, CacheBox>>,
}

impl ScopeCache {
    /// Looks up a live, unexpired, correctly-typed instance.
    ///
    /// Misses are reported for: no entry, TTL expiry (the stale box stays
    /// until the next `set` replaces it and refreshes the timestamp), a
    /// dead weak reference (the entry is purged), and a failed downcast
    /// check (defensive; also purged rather than treated as fatal).
    pub(crate) fn get(
        &self,
        key: &FactoryKey,
        ttl: Option<Duration>,
        check: impl Fn(&AnyArc) -> bool,
    ) -> Option<AnyArc> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.expired(ttl) {
            return None;
        }
        match entry.instance() {
            Some(value) if check(&value) => Some(value),
            _ => {
                // Dead weak box or wrong type: either way the entry is useless.
                entries.remove(key);
                None
            }
        }
    }

    /// Stores a box, replacing any previous entry for the key.
    pub(crate) fn set(&self, key: FactoryKey, boxed: CacheBox) {
        self.entries.lock().insert(key, boxed);
    }

    /// Removes every parameterization of one recipe.
    pub(crate) fn remove_base(&self, base: &FactoryKey) {
        self.entries.lock().retain(|key, _| key.base() != *base);
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Removes only entries stored by the given scope, leaving other
    /// scopes' entries in the same physical cache intact.
    pub(crate) fn clear_scope(&self, scope: ScopeId) {
        self.entries.lock().retain(|_, entry| entry.scope != scope);
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[cfg(any(test, feature = "diagnostics"))]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Copies the current entries for a push/pop snapshot.
    pub(crate) fn snapshot(&self) -> HashMap<FactoryKey, CacheBox> {
        self.entries.lock().clone()
    }

    pub(crate) fn restore(&self, entries: HashMap<FactoryKey, CacheBox>) {
        *self.entries.lock() = entries;
    }
}
