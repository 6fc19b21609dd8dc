//! Runtime context flags and context-keyed recipe overrides.
//!
//! The hosting process supplies a handful of process-wide flags (launch
//! arguments, preview/test mode, simulator vs. device, debug build); the
//! engine only reads them when picking the effective recipe for a
//! resolution. See [`crate::Factory::on_context`] for registering
//! context-specific recipes.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::registry::AnyRecipe;

/// Tag naming the runtime condition under which an override recipe applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextTag {
    /// Applies while the named launch argument is active.
    Arg(String),
    /// Applies in preview mode.
    Preview,
    /// Applies in test mode.
    Test,
    /// Applies when running on a simulator.
    Simulator,
    /// Applies when running on a physical device.
    Device,
    /// Applies in debug builds.
    Debug,
}

/// Process-wide runtime flags, supplied by the host.
///
/// All fields are plain data; [`RuntimeContext::snapshot`] returns a copy
/// of the current state and the `set_*` associated functions mutate the
/// global. The debug flag defaults to `cfg!(debug_assertions)`.
///
/// # Examples
///
/// ```rust
/// use forge_di::RuntimeContext;
///
/// RuntimeContext::set_test(true);
/// assert!(RuntimeContext::snapshot().test);
/// RuntimeContext::reset();
/// assert!(!RuntimeContext::snapshot().test);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Currently active launch arguments.
    pub arguments: Vec<String>,
    /// Running inside a UI preview.
    pub preview: bool,
    /// Running under a test harness.
    pub test: bool,
    /// Running on a simulator.
    pub simulator: bool,
    /// Running on a physical device.
    pub device: bool,
    /// Debug build.
    pub debug: bool,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self {
            arguments: Vec::new(),
            preview: false,
            test: false,
            simulator: false,
            device: false,
            debug: cfg!(debug_assertions),
        }
    }
}

static CONTEXT: Lazy<Mutex<RuntimeContext>> = Lazy::new(|| Mutex::new(RuntimeContext::default()));

impl RuntimeContext {
    /// Copies the current process-wide context.
    pub fn snapshot() -> RuntimeContext {
        CONTEXT.lock().clone()
    }

    /// Replaces the active launch arguments.
    pub fn set_arguments<I, S>(arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CONTEXT.lock().arguments = arguments.into_iter().map(Into::into).collect();
    }

    /// Adds one launch argument to the active set.
    pub fn add_argument(argument: impl Into<String>) {
        CONTEXT.lock().arguments.push(argument.into());
    }

    pub fn set_preview(on: bool) {
        CONTEXT.lock().preview = on;
    }

    pub fn set_test(on: bool) {
        CONTEXT.lock().test = on;
    }

    pub fn set_simulator(on: bool) {
        CONTEXT.lock().simulator = on;
    }

    pub fn set_device(on: bool) {
        CONTEXT.lock().device = on;
    }

    pub fn set_debug(on: bool) {
        CONTEXT.lock().debug = on;
    }

    /// Restores the defaults (empty arguments, all flags off, debug from
    /// the build configuration).
    pub fn reset() {
        *CONTEXT.lock() = RuntimeContext::default();
    }

    /// True when the named launch argument is active.
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.iter().any(|a| a == name)
    }
}

/// Picks the context override that applies under the given runtime flags.
///
/// Precedence, highest first: a matching launch argument, then preview,
/// test, simulator, device, debug. Within the argument tier the first
/// registered match wins.
pub(crate) fn select_override<'a>(
    ctx: &RuntimeContext,
    overrides: &'a [(ContextTag, AnyRecipe)],
) -> Option<&'a AnyRecipe> {
    if !ctx.arguments.is_empty() {
        for (tag, recipe) in overrides {
            if let ContextTag::Arg(name) = tag {
                if ctx.has_argument(name) {
                    return Some(recipe);
                }
            }
        }
    }

    let tiers = [
        (ctx.preview, ContextTag::Preview),
        (ctx.test, ContextTag::Test),
        (ctx.simulator, ContextTag::Simulator),
        (ctx.device, ContextTag::Device),
        (ctx.debug, ContextTag::Debug),
    ];
    for (active, wanted) in tiers {
        if !active {
            continue;
        }
        if let Some((_, recipe)) = overrides.iter().find(|(tag, _)| *tag == wanted) {
            return Some(recipe);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AnyArc;
    use std::sync::Arc;

    fn recipe(value: u32) -> AnyRecipe {
        Arc::new(move |_| Some(Arc::new(value) as AnyArc))
    }

    fn run(recipe: &AnyRecipe) -> u32 {
        let any = (recipe)(Box::new(())).unwrap();
        *any.downcast::<u32>().unwrap()
    }

    fn ctx() -> RuntimeContext {
        RuntimeContext {
            arguments: Vec::new(),
            preview: false,
            test: false,
            simulator: false,
            device: false,
            debug: false,
        }
    }

    #[test]
    fn argument_beats_named_contexts() {
        let overrides = vec![
            (ContextTag::Test, recipe(1)),
            (ContextTag::Arg("mock".to_string()), recipe(2)),
        ];
        let mut context = ctx();
        context.test = true;
        context.arguments = vec!["mock".to_string()];

        let selected = select_override(&context, &overrides).unwrap();
        assert_eq!(run(selected), 2);
    }

    #[test]
    fn preview_beats_test_beats_debug() {
        let overrides = vec![
            (ContextTag::Debug, recipe(1)),
            (ContextTag::Test, recipe(2)),
            (ContextTag::Preview, recipe(3)),
        ];
        let mut context = ctx();
        context.debug = true;
        context.test = true;
        assert_eq!(run(select_override(&context, &overrides).unwrap()), 2);

        context.preview = true;
        assert_eq!(run(select_override(&context, &overrides).unwrap()), 3);
    }

    #[test]
    fn no_active_condition_selects_nothing() {
        let overrides = vec![(ContextTag::Test, recipe(1))];
        assert!(select_override(&ctx(), &overrides).is_none());
    }
}
