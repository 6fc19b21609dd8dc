#![no_main]

use forge_di::{Container, Scope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }

    let seed = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let param = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let pattern = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

    let container = Container::named("fuzz_resolution");

    match pattern % 3 {
        0 => {
            // Cached resolution is stable under repeated access.
            let factory = container.factory("seeded", move || seed);
            factory.scope(&Scope::cached());
            let first = factory.resolve();
            let second = factory.resolve();
            assert_eq!(*first, *second);
        }
        1 => {
            // Parameterized factories produce consistent values per param.
            let factory = container.parameterized::<u64, u32>("derived", |p| u64::from(p) * 3);
            factory.scope(&Scope::cached());
            let value = factory.resolve_with(param);
            assert_eq!(*value, u64::from(param) * 3);
            let again = factory.resolve_with(param);
            assert_eq!(*again, u64::from(param) * 3);
        }
        _ => {
            // Optional recipes driven by the input never cache absence.
            let factory = container.optional::<u32>("maybe", move || {
                if seed % 2 == 0 {
                    Some(seed)
                } else {
                    None
                }
            });
            factory.scope(&Scope::cached());
            let outcome = factory.resolve();
            assert_eq!(outcome.is_some(), seed % 2 == 0);
        }
    }
});
