//! Factory key types for the dependency resolution engine.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Key for registration storage and cache lookup.
///
/// A key uniquely identifies one declared dependency: the container that
/// owns it, the produced type, the declaration site, and (for parameterized
/// recipes) a hash of the resolution parameter.
///
/// Type identity is carried as the fully-qualified type name from
/// [`std::any::type_name`], never a raw `TypeId`, so two keys built for the
/// same declaration in independently compiled modules compare equal.
///
/// Keys are cheap value types, built fresh on every resolution call.
///
/// # Examples
///
/// ```rust
/// use forge_di::FactoryKey;
///
/// let key = FactoryKey::new::<String>("shared", "greeting");
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.site(), "greeting");
/// assert!(key.param().is_none());
///
/// // Parameterized lookups carry a parameter hash; the base key drops it.
/// let per_param = key.with_param(42);
/// assert_ne!(per_param, key);
/// assert_eq!(per_param.base(), key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactoryKey {
    owner: &'static str,
    type_name: &'static str,
    site: &'static str,
    param: Option<u64>,
}

impl FactoryKey {
    /// Builds the base key for a declaration producing `T`.
    #[inline(always)]
    pub fn new<T: 'static>(owner: &'static str, site: &'static str) -> Self {
        Self {
            owner,
            type_name: std::any::type_name::<T>(),
            site,
            param: None,
        }
    }

    /// Returns a copy of this key carrying the given parameter hash.
    ///
    /// Used by parameterized factories so each distinct parameter caches
    /// its own instance.
    #[inline(always)]
    pub fn with_param(&self, param_hash: u64) -> Self {
        Self {
            param: Some(param_hash),
            ..*self
        }
    }

    /// Returns this key with the parameter hash stripped.
    ///
    /// Registrations and options are stored under the base key; cache
    /// entries carry the full key.
    #[inline(always)]
    pub fn base(&self) -> Self {
        Self { param: None, ..*self }
    }

    /// True when this key is its own base (no parameter hash).
    #[inline(always)]
    pub fn is_base(&self) -> bool {
        self.param.is_none()
    }

    /// The owning container's name.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// The produced type's fully-qualified name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The declaration-site tag (usually the accessor name).
    pub fn site(&self) -> &'static str {
        self.site
    }

    /// The parameter hash for parameterized lookups, if any.
    pub fn param(&self) -> Option<u64> {
        self.param
    }

    /// Get the type name for display in error messages and chain dumps.
    pub fn display_name(&self) -> &'static str {
        self.type_name
    }
}

/// Hashes a resolution parameter into the key's parameter slot.
///
/// The unit parameter hashes to `None` so paramless factories produce base
/// keys directly.
#[inline(always)]
pub fn param_hash_of<P: Hash + 'static>(param: &P) -> Option<u64> {
    if std::any::TypeId::of::<P>() == std::any::TypeId::of::<()>() {
        return None;
    }
    let mut hasher = DefaultHasher::new();
    param.hash(&mut hasher);
    Some(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_over_all_components() {
        let a = FactoryKey::new::<u32>("shared", "port");
        let b = FactoryKey::new::<u32>("shared", "port");
        assert_eq!(a, b);

        assert_ne!(a, FactoryKey::new::<u32>("shared", "other_port"));
        assert_ne!(a, FactoryKey::new::<u64>("shared", "port"));
        assert_ne!(a, FactoryKey::new::<u32>("test", "port"));
        assert_ne!(a, a.with_param(1));
    }

    #[test]
    fn base_strips_only_param() {
        let key = FactoryKey::new::<String>("shared", "svc").with_param(99);
        let base = key.base();
        assert!(base.is_base());
        assert_eq!(base.owner(), key.owner());
        assert_eq!(base.type_name(), key.type_name());
        assert_eq!(base.site(), key.site());
    }

    #[test]
    fn unit_param_hashes_to_none() {
        assert_eq!(param_hash_of(&()), None);
        assert!(param_hash_of(&7u8).is_some());
        assert_eq!(param_hash_of(&"a"), param_hash_of(&"a"));
        assert_ne!(param_hash_of(&"a"), param_hash_of(&"b"));
    }
}
