//! The `Action` sum type emitted by the FSM and consumed by the stream
//! composer.
//!
//! Handler invocation happens synchronously, inside [`crate::fsm::Fsm`],
//! before an `Action` is ever returned: a coroutine-driven approach would
//! work too, but synchronous callbacks let the FSM stay allocation-free and
//! `no_std`-compatible while still guaranteeing that all actions for byte N,
//! including handler side effects, are visible before byte N+1 is fed in.
//! What the composer receives is only ever "write these bytes"; see
//! DESIGN.md for the record of this decision.

use bytes::Bytes;

use crate::status::Direction;
use crate::telnet::op_command;

/// A negotiation reply the stream composer must send as
/// `IAC (WILL|WONT|DO|DONT) opt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct NegotiationResponse {
    /// `Local` selects WILL/WONT, `Remote` selects DO/DONT.
    pub direction: Direction,
    pub enable: bool,
    pub option: u8,
}

impl NegotiationResponse {
    #[must_use]
    pub const fn new(direction: Direction, enable: bool, option: u8) -> Self {
        Self {
            direction,
            enable,
            option,
        }
    }

    /// The three wire bytes: `IAC`, the command, and the option id.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 3] {
        let command = match (self.direction, self.enable) {
            (Direction::Local, true) => op_command::WILL,
            (Direction::Local, false) => op_command::WONT,
            (Direction::Remote, true) => op_command::DO,
            (Direction::Remote, false) => op_command::DONT,
        };
        [op_command::IAC, command, self.option]
    }
}

/// A reply to an inbound subnegotiation, to be framed as
/// `IAC SB opt <payload> IAC SE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnegotiation {
    pub option: u8,
    pub payload: Bytes,
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for Subnegotiation {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let option = u.arbitrary()?;
        let payload: alloc::vec::Vec<u8> = u.arbitrary()?;
        Ok(Self {
            option,
            payload: Bytes::from(payload),
        })
    }
}

/// What the stream composer must do in response to a processed byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a negotiation reply.
    Negotiation(NegotiationResponse),
    /// Send pre-escaped bytes verbatim (used for the AYT textual reply).
    RawWrite(Bytes),
    /// Send a subnegotiation reply. Only ever emitted with a non-empty
    /// payload; an empty handler reply means nothing is sent.
    Subnegotiation(Subnegotiation),
}

impl From<NegotiationResponse> for Action {
    fn from(response: NegotiationResponse) -> Self {
        Action::Negotiation(response)
    }
}
