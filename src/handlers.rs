//! User-supplied callbacks invoked after successful option state transitions
//! and for subnegotiation payloads.
//!
//! Registration is per-FSM, so unlike [`crate::registry::OptionRegistry`]
//! this needs no lock: registration and unregistration only ever happen on
//! whatever thread owns the `Fsm`.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use bytes::Bytes;

use crate::error::ErrorKind;
use crate::status::Direction;

/// Runs after an option transitions to YES, in the given direction.
pub trait EnablementHandler: Send {
    fn on_enable(&mut self, option: u8, dir: Direction);
}

/// Runs after an option transitions to NO from YES, in the given direction.
pub trait DisablementHandler: Send {
    fn on_disable(&mut self, option: u8, dir: Direction);
}

/// Runs when a subnegotiation closes for a registered option.
///
/// Returns the reply payload to send back framed as a subnegotiation
/// (`IAC SB opt ... IAC SE`), or an empty `Bytes` if there is nothing to
/// send. This lets one handler both observe an `IS` payload and reply to a
/// `SEND`.
pub trait SubnegotiationHandler: Send {
    fn on_subnegotiation(&mut self, option: u8, payload: Bytes) -> Bytes;
}

impl<F: FnMut(u8, Direction) + Send> EnablementHandler for F {
    fn on_enable(&mut self, option: u8, dir: Direction) {
        self(option, dir);
    }
}

impl<F: FnMut(u8, Direction) + Send> DisablementHandler for F {
    fn on_disable(&mut self, option: u8, dir: Direction) {
        self(option, dir);
    }
}

impl<F: FnMut(u8, Bytes) -> Bytes + Send> SubnegotiationHandler for F {
    fn on_subnegotiation(&mut self, option: u8, payload: Bytes) -> Bytes {
        self(option, payload)
    }
}

#[derive(Default)]
struct Handlers {
    enablement: Option<Box<dyn EnablementHandler>>,
    disablement: Option<Box<dyn DisablementHandler>>,
    subnegotiation: Option<Box<dyn SubnegotiationHandler>>,
}

/// Mapping from option id to its registered handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<u8, Handlers>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enablement_handler(
        &mut self,
        option: u8,
        handler: impl EnablementHandler + 'static,
    ) {
        self.handlers.entry(option).or_default().enablement = Some(Box::new(handler));
    }

    pub fn set_disablement_handler(
        &mut self,
        option: u8,
        handler: impl DisablementHandler + 'static,
    ) {
        self.handlers.entry(option).or_default().disablement = Some(Box::new(handler));
    }

    /// Register a subnegotiation handler for `option`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UserHandlerForbidden`] for STATUS: its
    /// subnegotiation is built in and reserved.
    pub fn set_subnegotiation_handler(
        &mut self,
        option: u8,
        handler: impl SubnegotiationHandler + 'static,
    ) -> Result<(), ErrorKind> {
        if option == crate::telnet::op_option::STATUS {
            return Err(ErrorKind::UserHandlerForbidden(option));
        }
        self.handlers.entry(option).or_default().subnegotiation = Some(Box::new(handler));
        Ok(())
    }

    pub fn unregister(&mut self, option: u8) {
        self.handlers.remove(&option);
    }

    pub fn invoke_enablement(&mut self, option: u8, dir: Direction) {
        if let Some(handlers) = self.handlers.get_mut(&option) {
            if let Some(handler) = handlers.enablement.as_mut() {
                handler.on_enable(option, dir);
            }
        }
    }

    pub fn invoke_disablement(&mut self, option: u8, dir: Direction) {
        if let Some(handlers) = self.handlers.get_mut(&option) {
            if let Some(handler) = handlers.disablement.as_mut() {
                handler.on_disable(option, dir);
            }
        }
    }

    /// Invoke the registered subnegotiation handler, if any.
    ///
    /// Returns `None` (and the caller should log `UserHandlerNotFound`) if no
    /// handler is registered for `option`.
    pub fn invoke_subnegotiation(&mut self, option: u8, payload: Bytes) -> core::option::Option<Bytes> {
        self.handlers
            .get_mut(&option)
            .and_then(|handlers| handlers.subnegotiation.as_mut())
            .map(|handler| handler.on_subnegotiation(option, payload))
    }

    #[must_use]
    pub fn has_subnegotiation_handler(&self, option: u8) -> bool {
        self.handlers
            .get(&option)
            .is_some_and(|handlers| handlers.subnegotiation.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_subnegotiation_handler_forbidden() {
        let mut registry = HandlerRegistry::new();
        let result = registry
            .set_subnegotiation_handler(crate::telnet::op_option::STATUS, |_opt, payload| payload);
        assert_eq!(
            result,
            Err(ErrorKind::UserHandlerForbidden(crate::telnet::op_option::STATUS))
        );
    }

    #[test]
    fn enablement_handler_invoked_once_registered() {
        use core::sync::atomic::{AtomicU32, Ordering};

        let mut registry = HandlerRegistry::new();
        struct Counter(alloc::sync::Arc<AtomicU32>);
        impl EnablementHandler for Counter {
            fn on_enable(&mut self, _option: u8, _dir: Direction) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let counter = alloc::sync::Arc::new(AtomicU32::new(0));
        registry.set_enablement_handler(1, Counter(counter.clone()));
        registry.invoke_enablement(1, Direction::Local);
        registry.invoke_enablement(2, Direction::Local);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
