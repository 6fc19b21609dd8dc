#![no_main]

use forge_di::{Container, ResetKind, Scope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let container = Container::named("fuzz_registration");
    let factory = container.factory::<u32>("value", || 0);

    // Each byte drives one registry operation; resolution must never
    // corrupt state or deadlock regardless of the sequence.
    for (index, byte) in data.iter().enumerate().take(64) {
        match byte % 8 {
            0 => {
                let value = index as u32;
                factory.register(move || value);
            }
            1 => {
                factory.scope(&Scope::cached());
            }
            2 => {
                factory.scope(&Scope::unique());
            }
            3 => {
                container.push();
            }
            4 => {
                container.pop();
            }
            5 => {
                factory.reset(ResetKind::Scope);
            }
            6 => {
                container.reset(ResetKind::Registration);
            }
            _ => {
                let _ = factory.resolve();
            }
        }
    }

    // The container stays resolvable after any operation sequence.
    let _ = factory.resolve();
});
