//! Per-key factory options and reset granularity.

use std::time::Duration;

use crate::context::ContextTag;
use crate::registry::{AnyDecorator, AnyRecipe};
use crate::scope::Scope;

/// What a reset clears, for both containers and individual factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Registrations, options, and cached instances.
    All,
    /// Registered recipe overrides only (declared recipes reappear).
    Registration,
    /// Cached instances only (registrations persist).
    Scope,
    /// Context overrides only.
    Context,
    /// Nothing.
    None,
}

/// Mutable per-key metadata, created lazily on first modification.
///
/// The `once` flag locks the structural fields (scope, TTL, decorator)
/// against later writers; context overrides and recipe registrations still
/// layer on top of a once-locked key.
#[derive(Clone, Default)]
pub(crate) struct FactoryOptions {
    pub(crate) scope: Option<Scope>,
    pub(crate) ttl: Option<Duration>,
    pub(crate) overrides: Vec<(ContextTag, AnyRecipe)>,
    pub(crate) decorator: Option<AnyDecorator>,
    pub(crate) once: bool,
}

impl FactoryOptions {
    /// Registers a context override, replacing any previous recipe under
    /// the same tag.
    pub(crate) fn set_override(&mut self, tag: ContextTag, recipe: AnyRecipe) {
        if let Some(slot) = self.overrides.iter_mut().find(|(t, _)| *t == tag) {
            slot.1 = recipe;
        } else {
            self.overrides.push((tag, recipe));
        }
    }
}
