use forge_di::{Container, FactoryKey, LoggingObserver, ResolutionObserver, Scope};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recording {
    events: Mutex<Vec<String>>,
}

impl ResolutionObserver for Recording {
    fn resolving(&self, key: &FactoryKey) {
        self.events.lock().push(format!("resolving {}", key.site()));
    }

    fn resolved(&self, key: &FactoryKey, _duration: Duration) {
        self.events.lock().push(format!("resolved {}", key.site()));
    }
}

#[test]
fn test_observer_sees_every_resolution() {
    let container = Container::named("obs_events");
    let observer = Arc::new(Recording::default());
    container.add_observer(observer.clone());

    let value = container.factory::<u32>("value", || 1);
    let _ = value.resolve();
    let _ = value.resolve();

    let events = observer.events.lock();
    assert_eq!(
        *events,
        vec![
            "resolving value",
            "resolved value",
            "resolving value",
            "resolved value"
        ]
    );
}

#[test]
fn test_observer_sees_nested_resolutions() {
    struct Outer;

    let container = Container::named("obs_nested");
    let observer = Arc::new(Recording::default());
    container.add_observer(observer.clone());

    let inner_container = container.clone();
    let outer = container.factory("outer", move || {
        let _ = inner_container.factory::<u32>("inner", || 1).resolve();
        Outer
    });

    let _ = outer.resolve();

    let events = observer.events.lock();
    assert_eq!(
        *events,
        vec![
            "resolving outer",
            "resolving inner",
            "resolved inner",
            "resolved outer"
        ]
    );
}

#[test]
fn test_observer_sees_cache_hits() {
    let container = Container::named("obs_cached");
    let observer = Arc::new(Recording::default());
    container.add_observer(observer.clone());

    let value = container.factory::<u32>("value", || 1);
    value.scope(&Scope::cached());
    let _ = value.resolve();
    let _ = value.resolve();

    // Cache hits are observed like any other resolution.
    assert_eq!(observer.events.lock().len(), 4);
}

#[test]
fn test_logging_observer_is_installable() {
    let container = Container::named("obs_logging");
    container.add_observer(Arc::new(LoggingObserver::with_prefix("[obs-test]")));

    let value = container.factory::<u32>("value", || 1);
    assert_eq!(*value.resolve(), 1);
}
