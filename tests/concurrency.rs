use crossbeam_utils::thread;
use forge_di::{Container, Factory, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Tagged {
    tag: usize,
}

static NEXT_TAG: AtomicUsize = AtomicUsize::new(0);

impl Tagged {
    fn new() -> Self {
        Self {
            tag: NEXT_TAG.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[test]
fn test_concurrent_cached_resolution_yields_one_instance() {
    let container = Container::named("conc_cached");
    let factory = container.factory("service", Tagged::new);
    factory.scope(&Scope::cached());

    thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                s.spawn(move |_| factory.resolve().tag)
            })
            .collect();

        let tags: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(
            tags.windows(2).all(|w| w[0] == w[1]),
            "all threads must observe one cached instance: {:?}",
            tags
        );
    })
    .unwrap();
}

#[test]
fn test_concurrent_registration_and_resolution() {
    let container = Container::named("conc_register");
    let factory = container.factory::<usize>("value", || 0);
    factory.scope(&Scope::cached());

    thread::scope(|s| {
        for worker in 0..4usize {
            let factory = factory.clone();
            s.spawn(move |_| {
                for round in 0..50usize {
                    let value = worker * 1000 + round;
                    factory.register(move |_| value);
                    let resolved = *factory.resolve();
                    // Any registered value (or the declared zero) is
                    // acceptable; corruption or a deadlock is not.
                    assert!(resolved == 0 || resolved < 4000);
                }
            });
        }
    })
    .unwrap();

    // A final registration is observed in order.
    factory.register(|_| 9999);
    assert_eq!(*factory.resolve(), 9999);
}

#[test]
fn test_reentrant_nested_resolution_under_contention() {
    struct Outer {
        inner: Arc<Tagged>,
    }

    fn inner(container: &Container) -> Factory<Tagged> {
        let f = container.factory("inner", Tagged::new);
        f.scope(&Scope::cached());
        f
    }

    fn outer(container: &Container) -> Factory<Outer> {
        let c = container.clone();
        container.factory("outer", move || Outer {
            inner: inner(&c).resolve(),
        })
    }

    let container = Container::named("conc_reentrant");

    thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                s.spawn(move |_| outer(&container).resolve().inner.tag)
            })
            .collect();

        let tags: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // The nested cached dependency is one instance across all threads.
        assert!(tags.windows(2).all(|w| w[0] == w[1]));
    })
    .unwrap();
}

#[test]
fn test_concurrent_push_pop_isolation() {
    let container = Container::named("conc_push_pop");
    let factory = container.factory::<u32>("value", || 1);

    // push/pop pairs from many threads must leave the container usable.
    thread::scope(|s| {
        for _ in 0..4 {
            let container = container.clone();
            s.spawn(move |_| {
                for _ in 0..25 {
                    container.push();
                    container.pop();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(*factory.resolve(), 1);
}
