#![no_main]

use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use telnet_engine::config::EngineConfig;
use telnet_engine::fsm::Fsm;
use telnet_engine::handlers::HandlerRegistry;
use telnet_engine::registry::{Option as OptDescriptor, OptionRegistry};

#[derive(Arbitrary, Debug)]
struct Session {
    options: Vec<u8>,
    received: Vec<Vec<u8>>,
}

fuzz_target!(|session: Session| {
    let mut registry = OptionRegistry::new();
    for id in session.options {
        registry.upsert(
            OptDescriptor::new(id, "FUZZ")
                .with_local(|| true)
                .with_remote(|| true)
                .with_subnegotiation(256),
        );
    }

    let mut fsm = Fsm::new();
    let mut handlers = HandlerRegistry::new();
    let config = EngineConfig::new();

    for chunk in session.received {
        for byte in chunk {
            fsm.process_byte(byte, &registry, &mut handlers, &config);
        }
    }

    for option in 0..=u8::MAX {
        assert!(fsm.status().get(option).is_valid());
    }
});
