//! The RFC 1143 "Q Method" option negotiation engine.
//!
//! Two synchronous entry points drive user-initiated negotiation,
//! [`request_option`] and [`disable_option`]; the four `receive_*` functions
//! implement the reception-side decision matrix invoked from the FSM's
//! `OptionNegotiation` state for each of WILL/WONT/DO/DONT. Both
//! sides of the table are written out explicitly rather than derived from
//! each other, since RFC 1143 §7's agree/disagree/crossed-request cases are
//! exactly the kind of logic that is easy to get subtly wrong by "being
//! clever" about symmetry.

use crate::action::NegotiationResponse;
use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::handlers::HandlerRegistry;
use crate::registry::OptionRegistry;
use crate::status::{Direction, NegotiationState, OptionStatusDB, Queue};

/// User code wants to enable `option` in `direction`.
///
/// # Errors
///
/// [`ErrorKind::OptionNotAvailable`] if `option` is unregistered or does not
/// support `direction`.
pub fn request_option(
    option: u8,
    direction: Direction,
    db: &mut OptionStatusDB,
    registry: &OptionRegistry,
    config: &EngineConfig,
) -> Result<core::option::Option<NegotiationResponse>, ErrorKind> {
    let supported = registry
        .get(option)
        .is_some_and(|descriptor| descriptor.supports(direction));
    if !supported {
        return Err(ErrorKind::OptionNotAvailable(option));
    }

    let status = db.get_mut(option);
    match current_state(status, direction) {
        NegotiationState::No => {
            status.pend_enable(direction);
            Ok(Some(NegotiationResponse::new(direction, true, option)))
        }
        NegotiationState::Yes => {
            config.log_warn("request_option: option already enabled");
            Ok(None)
        }
        NegotiationState::WantNo => match current_queue(status, direction) {
            Queue::Empty => {
                status.enqueue(direction, option)?;
                Ok(None)
            }
            Queue::Opposite => {
                config.log_warn("request_option: enable already queued behind pending disable");
                Ok(None)
            }
        },
        NegotiationState::WantYes => match current_queue(status, direction) {
            Queue::Empty => {
                config.log_warn("request_option: enable already in flight");
                Ok(None)
            }
            Queue::Opposite => {
                // Cancels the queued disable request.
                status.dequeue(direction);
                Ok(None)
            }
        },
    }
}

/// User code wants to disable `option` in `direction`. Invokes the registered disablement handler
/// synchronously when the transition is YES -> WANTNO (see [`crate::action`]
/// for why handler invocation is synchronous in this port).
pub fn disable_option(
    option: u8,
    direction: Direction,
    db: &mut OptionStatusDB,
    handlers: &mut HandlerRegistry,
    config: &EngineConfig,
) -> core::option::Option<NegotiationResponse> {
    let status = db.get_mut(option);
    match current_state(status, direction) {
        NegotiationState::Yes => {
            status.pend_disable(direction);
            handlers.invoke_disablement(option, direction);
            Some(NegotiationResponse::new(direction, false, option))
        }
        NegotiationState::No => {
            config.log_warn("disable_option: option already disabled");
            None
        }
        NegotiationState::WantYes => match current_queue(status, direction) {
            Queue::Empty => {
                // enqueue() only fails outside WANT* states, which we're not in.
                let _ = status.enqueue(direction, option);
                None
            }
            Queue::Opposite => {
                config.log_warn("disable_option: disable already queued behind pending enable");
                None
            }
        },
        NegotiationState::WantNo => match current_queue(status, direction) {
            Queue::Empty => {
                config.log_warn("disable_option: disable already in flight");
                None
            }
            Queue::Opposite => {
                // Cancels the queued enable request.
                status.dequeue(direction);
                None
            }
        },
    }
}

/// Reception of a WILL (`direction = Remote`) or DO (`direction = Local`):
/// the peer proposes or confirms enabling `direction`'s side.
pub(crate) fn receive_enable(
    option: u8,
    direction: Direction,
    db: &mut OptionStatusDB,
    registry: &OptionRegistry,
    handlers: &mut HandlerRegistry,
    config: &EngineConfig,
) -> core::option::Option<NegotiationResponse> {
    let status = db.get_mut(option);
    match current_state(status, direction) {
        NegotiationState::No => {
            let accept = registry
                .get(option)
                .is_some_and(|descriptor| descriptor.supports(direction))
                || config.accepts_unknown_option(option, direction);
            if accept {
                status.enable(direction);
                handlers.invoke_enablement(option, direction);
            }
            Some(NegotiationResponse::new(direction, accept, option))
        }
        NegotiationState::Yes => None,
        NegotiationState::WantNo => match current_queue(status, direction) {
            Queue::Empty => {
                // Peer re-asserted WILL/DO after we already asked it to stop;
                // accept the disagreement and settle on NO.
                status.disable(direction);
                config.log_error(ErrorKind::InvalidNegotiation(option));
                None
            }
            Queue::Opposite => {
                status.enable(direction);
                status.dequeue(direction);
                None
            }
        },
        NegotiationState::WantYes => match current_queue(status, direction) {
            Queue::Empty => {
                status.enable(direction);
                handlers.invoke_enablement(option, direction);
                None
            }
            Queue::Opposite => {
                status.pend_disable(direction);
                status.dequeue(direction);
                Some(NegotiationResponse::new(direction, false, option))
            }
        },
    }
}

/// Reception of a WONT (`direction = Remote`) or DONT (`direction = Local`):
/// the peer refuses or confirms disabling `direction`'s side.
pub(crate) fn receive_disable(
    option: u8,
    direction: Direction,
    db: &mut OptionStatusDB,
    handlers: &mut HandlerRegistry,
) -> core::option::Option<NegotiationResponse> {
    let status = db.get_mut(option);
    match current_state(status, direction) {
        NegotiationState::No => None,
        NegotiationState::Yes => {
            status.disable(direction);
            handlers.invoke_disablement(option, direction);
            Some(NegotiationResponse::new(direction, false, option))
        }
        NegotiationState::WantNo => match current_queue(status, direction) {
            Queue::Empty => {
                status.disable(direction);
                None
            }
            Queue::Opposite => {
                status.pend_enable(direction);
                status.dequeue(direction);
                Some(NegotiationResponse::new(direction, true, option))
            }
        },
        NegotiationState::WantYes => match current_queue(status, direction) {
            Queue::Empty => {
                // Disagreement with our enable request: go to NO, no handler.
                status.disable(direction);
                None
            }
            Queue::Opposite => {
                status.disable(direction);
                status.dequeue(direction);
                None
            }
        },
    }
}

fn current_state(status: &crate::status::OptionStatus, direction: Direction) -> NegotiationState {
    match direction {
        Direction::Local => status.local_state(),
        Direction::Remote => status.remote_state(),
    }
}

fn current_queue(status: &crate::status::OptionStatus, direction: Direction) -> Queue {
    match direction {
        Direction::Local => status.local_queue(),
        Direction::Remote => status.remote_queue(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Option as OptDescriptor;

    fn echo_registry() -> OptionRegistry {
        let mut registry = OptionRegistry::empty();
        registry.upsert(OptDescriptor::new(1, "ECHO").with_local(|| true).with_remote(|| true));
        registry
    }

    #[test]
    fn request_then_confirm() {
        let mut db = OptionStatusDB::new();
        let registry = echo_registry();
        let config = EngineConfig::new();

        let response = request_option(1, Direction::Remote, &mut db, &registry, &config)
            .unwrap()
            .unwrap();
        assert!(response.enable);
        assert_eq!(db.get(1).remote_state(), NegotiationState::WantYes);

        let mut handlers = HandlerRegistry::new();
        let reply = receive_enable(1, Direction::Remote, &mut db, &registry, &mut handlers, &config);
        assert!(reply.is_none());
        assert_eq!(db.get(1).remote_state(), NegotiationState::Yes);
    }

    #[test]
    fn peer_proposes_unknown_option_is_refused() {
        let mut db = OptionStatusDB::new();
        let registry = OptionRegistry::empty();
        let mut handlers = HandlerRegistry::new();
        let config = EngineConfig::new();

        let reply = receive_enable(0x42, Direction::Remote, &mut db, &registry, &mut handlers, &config)
            .expect("a DONT/WONT reply is always sent for a rejected proposal");
        assert!(!reply.enable);
        assert_eq!(db.get(0x42).remote_state(), NegotiationState::No);
    }

    #[test]
    fn crossed_enable_requests_settle_without_looping() {
        // Both sides decide to enable option 1 "remote"-wise at once: we send
        // DO (our request_option), and separately receive WILL in reply to
        // our own DO once the peer's "local" side accepts it.
        let mut db = OptionStatusDB::new();
        let registry = echo_registry();
        let mut handlers = HandlerRegistry::new();
        let config = EngineConfig::new();

        let request = request_option(1, Direction::Remote, &mut db, &registry, &config).unwrap();
        assert!(matches!(request, Some(r) if r.enable));
        assert_eq!(db.get(1).remote_state(), NegotiationState::WantYes);

        // Peer's WILL arrives as the agreement to our DO.
        let reply = receive_enable(1, Direction::Remote, &mut db, &registry, &mut handlers, &config);
        assert!(reply.is_none());
        assert_eq!(db.get(1).remote_state(), NegotiationState::Yes);
        assert!(db.get(1).is_valid());
    }

    #[test]
    fn disable_then_confirm_invokes_handler_on_initiation() {
        use core::sync::atomic::{AtomicU32, Ordering};

        let mut db = OptionStatusDB::new();
        db.get_mut(1).enable(Direction::Local);
        let mut handlers = HandlerRegistry::new();
        let config = EngineConfig::new();

        let calls = alloc::sync::Arc::new(AtomicU32::new(0));
        struct Counter(alloc::sync::Arc<AtomicU32>);
        impl crate::handlers::DisablementHandler for Counter {
            fn on_disable(&mut self, _option: u8, _dir: Direction) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        handlers.set_disablement_handler(1, Counter(calls.clone()));

        let response = disable_option(1, Direction::Local, &mut db, &mut handlers, &config).unwrap();
        assert!(!response.enable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.get(1).local_state(), NegotiationState::WantNo);

        let confirm = receive_disable(1, Direction::Local, &mut db, &mut handlers);
        assert!(confirm.is_none());
        assert_eq!(db.get(1).local_state(), NegotiationState::No);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queued_opposite_request_cancels_without_wire_traffic() {
        let mut db = OptionStatusDB::new();
        let registry = echo_registry();
        let mut handlers = HandlerRegistry::new();
        let config = EngineConfig::new();

        request_option(1, Direction::Local, &mut db, &registry, &config).unwrap();
        assert_eq!(db.get(1).local_state(), NegotiationState::WantYes);

        let reply = disable_option(1, Direction::Local, &mut db, &mut handlers, &config);
        assert!(reply.is_none(), "queuing the opposite request emits nothing");
        assert!(db.get(1).queued(Direction::Local));

        // Requesting enable again cancels the queued disable.
        let reply = request_option(1, Direction::Local, &mut db, &registry, &config).unwrap();
        assert!(reply.is_none());
        assert!(!db.get(1).queued(Direction::Local));
        assert_eq!(db.get(1).local_state(), NegotiationState::WantYes);
    }
}
