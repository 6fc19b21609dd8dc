#![cfg(debug_assertions)]

use forge_di::{CircularPanic, Container, DiError, EngineContext, Factory};
use serial_test::serial;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Helper: assert that `f()` raises a circular fatal whose chain renders
/// exactly as `expected`.
fn assert_circular_panics<F>(f: F, expected: &str)
where
    F: FnOnce(),
{
    let outcome = catch_unwind(AssertUnwindSafe(f));
    let payload = outcome.expect_err("expected circular dependency fatal");

    let circular = payload
        .downcast_ref::<CircularPanic>()
        .expect("panic payload should be CircularPanic");
    assert_eq!(circular.message(), expected, "wrong circular chain");
}

struct A;
struct B;
struct C;

fn a(container: &Container) -> Factory<A> {
    let c = container.clone();
    container.factory("a", move || {
        let _ = b(&c).resolve();
        A
    })
}

fn b(container: &Container) -> Factory<B> {
    let c = container.clone();
    container.factory("b", move || {
        let _ = cee(&c).resolve();
        B
    })
}

fn cee(container: &Container) -> Factory<C> {
    let c = container.clone();
    container.factory("c", move || {
        let _ = a(&c).resolve();
        C
    })
}

#[test]
#[serial]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let container = Container::named("circular_self");
    let inner = container.clone();
    let factory = container.factory("selfref", move || {
        let again = inner.factory("selfref", || SelfReferencing);
        let _ = again.resolve();
        SelfReferencing
    });

    let name = std::any::type_name::<SelfReferencing>();
    assert_circular_panics(
        || {
            let _ = factory.resolve();
        },
        &format!("{} > {}", name, name),
    );
}

#[test]
#[serial]
fn test_three_level_circular_chain_message() {
    let container = Container::named("circular_three");

    let na = std::any::type_name::<A>();
    let nb = std::any::type_name::<B>();
    let nc = std::any::type_name::<C>();

    // A > B > C > A, in resolution order.
    assert_circular_panics(
        || {
            let _ = a(&container).resolve();
        },
        &format!("{} > {} > {} > {}", na, nb, nc, na),
    );
}

#[test]
#[serial]
fn test_engine_state_is_clean_after_fatal() {
    let container = Container::named("circular_recovery");

    let _ = catch_unwind(AssertUnwindSafe(|| {
        let _ = a(&container).resolve();
    }));

    // The fatal reset all tracking state, so ordinary resolution works.
    let value = container.factory::<u32>("value", || 7);
    assert_eq!(*value.resolve(), 7);
}

#[test]
#[serial]
fn test_try_resolve_surfaces_circular_as_error() {
    let container = Container::named("circular_try");

    match a(&container).try_resolve() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 4);
            assert_eq!(path.first(), path.last());
            assert!(path[0].contains("A"));
            assert!(path[1].contains("B"));
            assert!(path[2].contains("C"));
        }
        other => panic!("expected Circular error, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_chain_tolerance_allows_terminating_recursion() {
    // A recipe that resolves itself with a decremented parameter is
    // repeated-but-terminating: the same type appears on the chain once
    // per nesting level.
    fn countdown(container: &Container) -> Factory<u32, u32> {
        let c = container.clone();
        container.parameterized("countdown", move |n: u32| {
            if n == 0 {
                0
            } else {
                *countdown(&c).resolve_with(n - 1) + 1
            }
        })
    }

    let engine = EngineContext::global();
    engine.set_chain_tolerance(4);

    let container = Container::named("circular_tolerance");
    let depth = countdown(&container).resolve_with(3);
    assert_eq!(*depth, 3);

    engine.reset();
}

#[test]
#[serial]
fn test_cycle_still_fatal_above_tolerance() {
    let engine = EngineContext::global();
    engine.set_chain_tolerance(2);

    let container = Container::named("circular_tolerated");
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _ = a(&container).resolve();
    }));

    let payload = outcome.expect_err("cycle must still trip the chain");
    let circular = payload
        .downcast_ref::<CircularPanic>()
        .expect("typed payload");
    // With tolerance 2 the cycle runs one extra lap before the fatal.
    assert_eq!(circular.path.len(), 7);
    assert_eq!(circular.path.first(), circular.path.last());

    engine.reset();
}
