//! # forge-di
//!
//! Runtime dependency resolution for Rust: declare how to build a value,
//! resolve instances on demand, control their lifetime with scopes, and
//! swap recipes at runtime for tests, previews, or platform variants —
//! without touching call sites.
//!
//! ## Features
//!
//! - **Factory registrations**: declare a recipe once, override it at
//!   runtime; the next resolution sees the new recipe
//! - **Lifetime scopes**: unique, cached, graph, shared (weak), singleton,
//!   and user-defined scopes
//! - **Context overrides**: recipes keyed to launch arguments, test,
//!   preview, simulator/device, or debug mode, with fixed precedence
//! - **Re-entrant and thread-safe**: one process-wide reentrant lock
//!   serializes all resolution; recipes freely resolve nested dependencies
//! - **Circular dependency detection**: debug builds fail fast with the
//!   full dependency chain instead of overflowing the stack
//! - **Test isolation**: push/pop container state, granular resets
//!
//! ## Quick Start
//!
//! ```rust
//! use forge_di::{Container, Factory, Scope};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! // Expose accessors through an extension trait on Container.
//! trait AppServices {
//!     fn database(&self) -> Factory<Database>;
//!     fn user_service(&self) -> Factory<UserService>;
//! }
//!
//! impl AppServices for Container {
//!     fn database(&self) -> Factory<Database> {
//!         let f = self.factory("database", || Database {
//!             url: "postgres://localhost".to_string(),
//!         });
//!         f.scope(&Scope::cached());
//!         f
//!     }
//!
//!     fn user_service(&self) -> Factory<UserService> {
//!         let container = self.clone();
//!         self.factory("user_service", move || UserService {
//!             db: container.database().resolve(),
//!         })
//!     }
//! }
//!
//! let container = Container::new();
//! let users = container.user_service().resolve();
//! assert_eq!(users.db.url, "postgres://localhost");
//!
//! // Swap the database for a test double; call sites are untouched.
//! container.database().register(|_| Database {
//!     url: "sqlite::memory:".to_string(),
//! });
//! let users = container.user_service().resolve();
//! assert_eq!(users.db.url, "sqlite::memory:");
//! ```
//!
//! ## Lifetime Scopes
//!
//! - **Unique** (default): a fresh instance on every resolution
//! - **Cached**: held in the container until reset or re-registration
//! - **Graph**: shared within one outward resolution and its nested
//!   resolutions, then discarded
//! - **Shared**: held weakly; alive only while a caller retains the `Arc`
//! - **Singleton**: held in a process-wide store that container resets
//!   never touch
//!
//! ## Context Overrides
//!
//! ```rust
//! use forge_di::{Container, RuntimeContext};
//!
//! let container = Container::new();
//! let greeting = container.factory::<String>("greeting", || "hello".to_string());
//! greeting.on_test(|_| "test hello".to_string());
//!
//! RuntimeContext::set_test(true);
//! assert_eq!(*greeting.resolve(), "test hello");
//! RuntimeContext::reset();
//! assert_eq!(*greeting.resolve(), "hello");
//! ```

// Module declarations
pub mod container;
pub mod context;
pub mod error;
pub mod factory;
pub mod key;
pub mod observer;
pub mod options;
pub mod resolution;
pub mod scope;

// Internal modules
mod cache;
mod registry;

// Re-export core types
pub use container::Container;
pub use context::{ContextTag, RuntimeContext};
pub use error::{DiError, DiResult};
pub use factory::{Factory, OptionFactory};
pub use key::{param_hash_of, FactoryKey};
pub use observer::{LoggingObserver, ResolutionObserver};
pub use options::ResetKind;
pub use resolution::{CircularPanic, EngineContext};
pub use scope::{Scope, ScopeId};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unique_by_default() {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let container = Container::named("lib_unique");
        let service = container.factory("tagged", || {
            COUNTER.fetch_add(1, Ordering::SeqCst)
        });

        let a = service.resolve();
        let b = service.resolve();
        assert_ne!(*a, *b);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cached_returns_same_instance() {
        let container = Container::named("lib_cached");
        let service = container.factory::<String>("value", || "hello".to_string());
        service.scope(&Scope::cached());

        let a = service.resolve();
        let b = service.resolve();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registration_overrides_declared_recipe() {
        let container = Container::named("lib_register");
        let service = container.factory::<u32>("value", || 1);

        assert_eq!(*service.resolve(), 1);
        service.register(|_| 2);
        assert_eq!(*service.resolve(), 2);
    }

    #[test]
    fn test_parameterized_caches_per_parameter() {
        let container = Container::named("lib_param");
        let service = container.parameterized::<String, u32>("port", |port| format!("server:{}", port));
        service.scope(&Scope::cached());

        let a = service.resolve_with(80);
        let b = service.resolve_with(8080);
        let c = service.resolve_with(80);
        assert_eq!(*a, "server:80");
        assert_eq!(*b, "server:8080");
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_promised_resolves_to_none_until_registered() {
        struct Analytics;

        let container = Container::named("lib_promised");
        let analytics = container.promised::<Analytics>("analytics");

        assert!(analytics.resolve().is_none());
        analytics.register(|_| Some(Analytics));
        assert!(analytics.resolve().is_some());
    }
}
