//! The 7-state byte-level input FSM and the STATUS (option 5) built-in
//! subnegotiation handler.
//!
//! [`Fsm`] owns exactly the per-connection state that must never be shared
//! across connections: the state variable, the remembered command/option,
//! the subnegotiation buffer, and the option status table.
//! [`crate::registry::OptionRegistry`], [`crate::handlers::HandlerRegistry`]
//! and [`crate::config::EngineConfig`] are passed in by reference on every
//! call instead of owned, since the registry in particular may be shared
//! (and lock-guarded) across many FSMs.

use alloc::vec::Vec;

use bytes::Bytes;

use crate::action::{Action, NegotiationResponse, Subnegotiation};
use crate::config::EngineConfig;
use crate::error::{ErrorKind, ProcessingSignal};
use crate::handlers::HandlerRegistry;
use crate::qmethod;
use crate::registry::{OptionRegistry, DEFAULT_MAX_SUBNEGOTIATION_BYTES};
use crate::status::{Direction, OptionStatusDB};
use crate::telnet::{op_command, op_option, op_sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    HasCr,
    HasIac,
    OptionNegotiation,
    SubnegotiationOption,
    Subnegotiation,
    SubnegotiationIac,
}

/// Either of the two "soft" outcomes `process_byte` can report alongside its
/// forward/action results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmEvent {
    /// A benign signal the composer should act on (CR, EC, EL, AO, DM) or
    /// propagate (BRK, IP).
    Signal(ProcessingSignal),
    /// A protocol- or negotiation-level error; the offending byte(s) have
    /// already been discarded and the FSM has returned to `Normal`.
    Error(ErrorKind),
}

/// Everything `process_byte` reports for one input byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteOutcome {
    pub event: Option<FsmEvent>,
    /// `Some(byte)` if the composer should deliver `byte` to its
    /// destination buffer (not necessarily the input byte verbatim — see
    /// the escaped-IAC and CR/LF cases).
    pub forward: Option<u8>,
    pub action: Option<Action>,
}

impl ByteOutcome {
    fn forward(b: u8) -> Self {
        Self {
            forward: Some(b),
            ..Default::default()
        }
    }

    fn none() -> Self {
        Self::default()
    }

    fn signal(signal: ProcessingSignal) -> Self {
        Self {
            event: Some(FsmEvent::Signal(signal)),
            ..Default::default()
        }
    }

    fn error(error: ErrorKind) -> Self {
        Self {
            event: Some(FsmEvent::Error(error)),
            ..Default::default()
        }
    }

    fn action(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }
}

/// The per-connection Telnet byte-level state machine.
pub struct Fsm {
    state: State,
    command: u8,
    option: u8,
    subnegotiation: Vec<u8>,
    status: OptionStatusDB,
}

impl Default for Fsm {
    fn default() -> Self {
        Self {
            state: State::Normal,
            command: 0,
            option: 0,
            subnegotiation: Vec::new(),
            status: OptionStatusDB::new(),
        }
    }
}

impl Fsm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> &OptionStatusDB {
        &self.status
    }

    #[must_use]
    pub fn is_enabled(&self, option: u8, dir: Direction) -> bool {
        self.status.get(option).enabled(dir)
    }

    /// Begins negotiating enablement of `option` in `direction`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::OptionNotAvailable`] if the option is unregistered or
    /// does not support `direction`.
    pub fn request_option(
        &mut self,
        option: u8,
        direction: Direction,
        registry: &OptionRegistry,
        config: &EngineConfig,
    ) -> Result<core::option::Option<NegotiationResponse>, ErrorKind> {
        qmethod::request_option(option, direction, &mut self.status, registry, config)
    }

    /// Begins negotiating disablement of `option` in `direction`.
    pub fn disable_option(
        &mut self,
        option: u8,
        direction: Direction,
        handlers: &mut HandlerRegistry,
        config: &EngineConfig,
    ) -> core::option::Option<NegotiationResponse> {
        qmethod::disable_option(option, direction, &mut self.status, handlers, config)
    }

    fn to_normal(&mut self) {
        self.state = State::Normal;
        self.command = 0;
        self.option = 0;
        self.subnegotiation.clear();
    }

    fn local_binary(&self) -> bool {
        self.status.get(op_option::BINARY).enabled(Direction::Local)
    }

    /// The sole entry point: feed one byte, get back whatever the composer
    /// needs to do next. Infallible in the Rust sense — errors are reported
    /// as values in [`ByteOutcome::event`], never panics.
    pub fn process_byte(
        &mut self,
        b: u8,
        registry: &OptionRegistry,
        handlers: &mut HandlerRegistry,
        config: &EngineConfig,
    ) -> ByteOutcome {
        match self.state {
            State::Normal => self.process_normal(b),
            State::HasCr => self.process_has_cr(b),
            State::HasIac => self.process_has_iac(b, config),
            State::OptionNegotiation => self.process_option_negotiation(b, registry, handlers, config),
            State::SubnegotiationOption => self.process_subnegotiation_option(b, registry),
            State::Subnegotiation => self.process_subnegotiation(b, registry),
            State::SubnegotiationIac => self.process_subnegotiation_iac(b, handlers),
        }
    }

    fn process_normal(&mut self, b: u8) -> ByteOutcome {
        if b == op_command::IAC {
            self.state = State::HasIac;
            ByteOutcome::none()
        } else if b == b'\r' && !self.local_binary() {
            self.state = State::HasCr;
            ByteOutcome::signal(ProcessingSignal::CarriageReturn)
        } else {
            ByteOutcome::forward(b)
        }
    }

    fn process_has_cr(&mut self, b: u8) -> ByteOutcome {
        match b {
            0 => {
                self.state = State::Normal;
                ByteOutcome::none()
            }
            b'\n' => {
                self.state = State::Normal;
                ByteOutcome::forward(b)
            }
            op_command::IAC => {
                self.state = State::HasIac;
                ByteOutcome::none()
            }
            _ => {
                self.state = State::Normal;
                ByteOutcome::forward(b)
            }
        }
    }

    fn process_has_iac(&mut self, b: u8, config: &EngineConfig) -> ByteOutcome {
        use op_command::{AO, AYT, BRK, DM, DO, DONT, EC, EL, GA, IAC, IP, NOP, SB, SE, WILL, WONT};

        match b {
            IAC => {
                self.state = State::Normal;
                ByteOutcome::forward(0xFF)
            }
            WILL | WONT | DO | DONT => {
                self.command = b;
                self.state = State::OptionNegotiation;
                ByteOutcome::none()
            }
            SB => {
                self.state = State::SubnegotiationOption;
                ByteOutcome::none()
            }
            NOP => {
                self.state = State::Normal;
                ByteOutcome::none()
            }
            DM => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::DataMark)
            }
            BRK => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::Break)
            }
            IP => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::Interrupt)
            }
            AO => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::AbortOutput)
            }
            EC => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::EraseCharacter)
            }
            EL => {
                self.state = State::Normal;
                ByteOutcome::signal(ProcessingSignal::EraseLine)
            }
            AYT => {
                self.state = State::Normal;
                ByteOutcome::action(Action::RawWrite(config.ayt_response.clone()))
            }
            GA => {
                self.state = State::Normal;
                ByteOutcome::none()
            }
            SE => {
                self.state = State::Normal;
                ByteOutcome::error(ErrorKind::ProtocolViolation)
            }
            other => {
                self.state = State::Normal;
                ByteOutcome::error(ErrorKind::InvalidCommand(other))
            }
        }
    }

    fn process_option_negotiation(
        &mut self,
        b: u8,
        registry: &OptionRegistry,
        handlers: &mut HandlerRegistry,
        config: &EngineConfig,
    ) -> ByteOutcome {
        let command = self.command;
        let option = b;
        let outcome = match command {
            op_command::WILL => {
                qmethod::receive_enable(option, Direction::Remote, &mut self.status, registry, handlers, config)
                    .map(Action::from)
                    .map(ByteOutcome::action)
            }
            op_command::WONT => {
                qmethod::receive_disable(option, Direction::Remote, &mut self.status, handlers)
                    .map(Action::from)
                    .map(ByteOutcome::action)
            }
            op_command::DO => {
                qmethod::receive_enable(option, Direction::Local, &mut self.status, registry, handlers, config)
                    .map(Action::from)
                    .map(ByteOutcome::action)
            }
            op_command::DONT => {
                qmethod::receive_disable(option, Direction::Local, &mut self.status, handlers)
                    .map(Action::from)
                    .map(ByteOutcome::action)
            }
            _ => None,
        };
        self.to_normal();
        outcome.unwrap_or_else(ByteOutcome::none)
    }

    fn process_subnegotiation_option(&mut self, b: u8, registry: &OptionRegistry) -> ByteOutcome {
        self.option = b;
        match registry.get(b) {
            Some(descriptor) if descriptor.supports_subnegotiation => {
                self.state = State::Subnegotiation;
                self.subnegotiation.clear();
                ByteOutcome::none()
            }
            _ => {
                self.to_normal();
                ByteOutcome::error(ErrorKind::InvalidSubnegotiation(b))
            }
        }
    }

    fn process_subnegotiation(&mut self, b: u8, registry: &OptionRegistry) -> ByteOutcome {
        if b == op_command::IAC {
            self.state = State::SubnegotiationIac;
            return ByteOutcome::none();
        }
        let max = registry
            .get(self.option)
            .map_or(DEFAULT_MAX_SUBNEGOTIATION_BYTES, |descriptor| descriptor.max_subnegotiation_bytes);
        if self.subnegotiation.len() < max {
            self.subnegotiation.push(b);
            ByteOutcome::none()
        } else {
            ByteOutcome::error(ErrorKind::SubnegotiationOverflow(self.option))
        }
    }

    fn process_subnegotiation_iac(&mut self, b: u8, handlers: &mut HandlerRegistry) -> ByteOutcome {
        match b {
            op_command::IAC => {
                self.subnegotiation.push(0xFF);
                self.state = State::Subnegotiation;
                ByteOutcome::none()
            }
            op_command::SE => {
                let outcome = self.close_subnegotiation(handlers);
                self.to_normal();
                outcome
            }
            other => {
                // Per the resolved ambiguity in the subnegotiation framing
                // (only IAC SE / IAC IAC are valid here): log and discard,
                // but stay in Subnegotiation rather than Normal so the rest
                // of the payload up to a real IAC SE is not lost.
                self.state = State::Subnegotiation;
                ByteOutcome::error(ErrorKind::InvalidCommand(other))
            }
        }
    }

    fn close_subnegotiation(&mut self, handlers: &mut HandlerRegistry) -> ByteOutcome {
        let option = self.option;
        let payload = Bytes::copy_from_slice(&self.subnegotiation);

        if option == op_option::STATUS {
            return self.close_status_subnegotiation(payload, handlers);
        }

        match handlers.invoke_subnegotiation(option, payload) {
            Some(reply) if !reply.is_empty() => {
                ByteOutcome::action(Action::Subnegotiation(Subnegotiation { option, payload: reply }))
            }
            Some(_) => ByteOutcome::none(),
            None => ByteOutcome::error(ErrorKind::UserHandlerNotFound(option)),
        }
    }

    /// Built-in STATUS (option 5) subnegotiation handling.
    fn close_status_subnegotiation(&mut self, payload: Bytes, handlers: &mut HandlerRegistry) -> ByteOutcome {
        match payload.first() {
            Some(&op_sub::SEND) => {
                if !self.status.get(op_option::STATUS).enabled(Direction::Local) {
                    return ByteOutcome::error(ErrorKind::OptionNotAvailable(op_option::STATUS));
                }
                let mut reply = Vec::with_capacity(1 + self.subnegotiation.len());
                reply.push(op_sub::IS);
                for opt in self.status.enabled_options(Direction::Local) {
                    reply.push(op_command::WILL);
                    reply.push(opt);
                }
                for opt in self.status.enabled_options(Direction::Remote) {
                    reply.push(op_command::DO);
                    reply.push(opt);
                }
                ByteOutcome::action(Action::Subnegotiation(Subnegotiation {
                    option: op_option::STATUS,
                    payload: Bytes::from(reply),
                }))
            }
            Some(&op_sub::IS) => {
                if !self.status.get(op_option::STATUS).enabled(Direction::Remote) {
                    return ByteOutcome::error(ErrorKind::OptionNotAvailable(op_option::STATUS));
                }
                match handlers.invoke_subnegotiation(op_option::STATUS, payload.slice(1..)) {
                    Some(_) => ByteOutcome::none(),
                    None => ByteOutcome::error(ErrorKind::UserHandlerNotFound(op_option::STATUS)),
                }
            }
            _ => ByteOutcome::error(ErrorKind::InvalidSubnegotiation(op_option::STATUS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Option as OptDescriptor;

    fn harness() -> (Fsm, OptionRegistry, HandlerRegistry, EngineConfig) {
        (Fsm::new(), OptionRegistry::new(), HandlerRegistry::new(), EngineConfig::new())
    }

    fn feed(fsm: &mut Fsm, registry: &OptionRegistry, handlers: &mut HandlerRegistry, config: &EngineConfig, bytes: &[u8]) -> Vec<ByteOutcome> {
        bytes.iter().map(|&b| fsm.process_byte(b, registry, handlers, config)).collect()
    }

    #[test]
    fn pure_data_forwards_unchanged() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, b"Hello");
        let forwarded: Vec<u8> = outcomes.iter().filter_map(|o| o.forward).collect();
        assert_eq!(forwarded, b"Hello");
        assert!(outcomes.iter().all(|o| o.event.is_none() && o.action.is_none()));
    }

    #[test]
    fn escaped_iac_forwards_single_0xff() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0x41, 0xFF, 0xFF, 0x42]);
        let forwarded: Vec<u8> = outcomes.iter().filter_map(|o| o.forward).collect();
        assert_eq!(forwarded, [0x41, 0xFF, 0x42]);
    }

    #[test]
    fn peer_do_echo_is_accepted_when_supported() {
        let (mut fsm, mut registry, mut handlers, config) = harness();
        registry.upsert(OptDescriptor::new(op_option::ECHO, "ECHO").with_local(|| true));

        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0xFF, op_command::DO, op_option::ECHO]);
        let forwarded: Vec<u8> = outcomes.iter().filter_map(|o| o.forward).collect();
        assert!(forwarded.is_empty());

        let action = outcomes.last().unwrap().action.clone().unwrap();
        match action {
            Action::Negotiation(response) => {
                assert_eq!(response.direction, Direction::Local);
                assert!(response.enable);
                assert_eq!(response.to_bytes(), [op_command::IAC, op_command::WILL, op_option::ECHO]);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(fsm.is_enabled(op_option::ECHO, Direction::Local));
    }

    #[test]
    fn peer_proposes_unknown_option_is_refused() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0xFF, op_command::WILL, 0x42]);
        let action = outcomes.last().unwrap().action.clone().unwrap();
        match action {
            Action::Negotiation(response) => {
                assert_eq!(response.to_bytes(), [op_command::IAC, op_command::DONT, 0x42]);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(!fsm.is_enabled(0x42, Direction::Remote));
    }

    #[test]
    fn subnegotiation_unescapes_embedded_iac() {
        let (mut fsm, mut registry, mut handlers, config) = harness();
        registry.upsert(OptDescriptor::new(op_option::TERMINAL_TYPE, "TERMINAL-TYPE").with_subnegotiation(64));

        let seen: std::sync::Arc<std::sync::Mutex<Vec<u8>>> = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl crate::handlers::SubnegotiationHandler for Capture {
            fn on_subnegotiation(&mut self, _option: u8, payload: Bytes) -> Bytes {
                *self.0.lock().unwrap() = payload.to_vec();
                Bytes::new()
            }
        }
        handlers
            .set_subnegotiation_handler(op_option::TERMINAL_TYPE, Capture(seen.clone()))
            .unwrap();

        let input = [0xFF, 0xFA, op_option::TERMINAL_TYPE, 0x00, 0xFF, 0xFF, 0x41, 0xFF, 0xF0];
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &input);
        assert!(outcomes.iter().all(|o| o.forward.is_none()));
        assert_eq!(*seen.lock().unwrap(), alloc::vec![0x00, 0xFF, 0x41]);
    }

    #[test]
    fn ao_emits_abort_output_signal() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0xFF, op_command::AO]);
        assert_eq!(outcomes[1].event, Some(FsmEvent::Signal(ProcessingSignal::AbortOutput)));
    }

    #[test]
    fn ayt_emits_raw_write_of_configured_response() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0xFF, op_command::AYT]);
        assert_eq!(
            outcomes[1].action,
            Some(Action::RawWrite(config.ayt_response.clone()))
        );
    }

    #[test]
    fn cr_nul_collapses_and_cr_lf_passes_through() {
        let (mut fsm, registry, mut handlers, config) = harness();
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &[0x41, 0x0D, 0x00, 0x42]);
        assert_eq!(outcomes[1].event, Some(FsmEvent::Signal(ProcessingSignal::CarriageReturn)));
        assert_eq!(outcomes[2].forward, None);
        let forwarded: Vec<u8> = outcomes.iter().filter_map(|o| o.forward).collect();
        assert_eq!(forwarded, [0x41, 0x42]);

        let mut fsm2 = Fsm::new();
        let outcomes = feed(&mut fsm2, &registry, &mut handlers, &config, &[0x41, 0x0D, 0x0A, 0x42]);
        let forwarded: Vec<u8> = outcomes.iter().filter_map(|o| o.forward).collect();
        assert_eq!(forwarded, [0x41, 0x0A, 0x42]);
    }

    #[test]
    fn status_send_reports_enabled_options() {
        let (mut fsm, registry, mut handlers, config) = harness();
        fsm.request_option(op_option::STATUS, Direction::Local, &registry, &config).unwrap();
        qmethod::receive_enable(op_option::STATUS, Direction::Local, &mut fsm.status, &registry, &mut handlers, &config);
        qmethod::receive_enable(op_option::BINARY, Direction::Remote, &mut fsm.status, &registry, &mut handlers, &config);

        let input = [0xFF, 0xFA, op_option::STATUS, op_sub::SEND, 0xFF, 0xF0];
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &input);
        let action = outcomes.last().unwrap().action.clone().unwrap();
        match action {
            Action::Subnegotiation(sub) => {
                assert_eq!(sub.option, op_option::STATUS);
                assert!(sub.payload.starts_with(&[op_sub::IS]));
                assert!(sub.payload.windows(2).any(|w| w == [op_command::DO, op_option::BINARY]));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn unexpected_command_mid_subnegotiation_stays_in_subnegotiation() {
        let (mut fsm, mut registry, mut handlers, config) = harness();
        registry.upsert(OptDescriptor::new(op_option::NAWS, "NAWS").with_subnegotiation(64));
        handlers
            .set_subnegotiation_handler(op_option::NAWS, |_opt, payload: Bytes| payload)
            .unwrap();

        let input = [
            0xFF, 0xFA, op_option::NAWS, 0x01, 0xFF, op_command::WILL, 0x02, 0xFF, 0xF0,
        ];
        let outcomes = feed(&mut fsm, &registry, &mut handlers, &config, &input);
        // The bogus "IAC WILL" mid-subnegotiation is logged and discarded,
        // but the remaining payload (0x02) plus the real IAC SE still close
        // the subnegotiation normally.
        let errors: Vec<_> = outcomes.iter().filter_map(|o| o.event).collect();
        assert!(errors.iter().any(|e| matches!(e, FsmEvent::Error(ErrorKind::InvalidCommand(_)))));
        let action = outcomes.last().unwrap().action.clone().unwrap();
        match action {
            Action::Subnegotiation(sub) => assert_eq!(sub.payload.as_ref(), &[0x01, 0x02]),
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
