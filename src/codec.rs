//! A [`tokio_util::codec`] adapter over [`crate::fsm::Fsm`], for callers who
//! want a `Stream`/`Sink` of Telnet items instead of driving
//! [`crate::stream::TelnetStream`] directly (e.g. layering over a non-TCP
//! transport that has no OOB channel, so Synch is simply unsupported).
//!
//! Generalized from a flat `Decoder<Item = Vec<Event>>` shape to the richer
//! [`Item`] shape the Q-Method engine needs.

use alloc::vec::Vec;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::action::{Action, NegotiationResponse};
use crate::config::EngineConfig;
use crate::error::{ErrorKind, ProcessingSignal};
use crate::fsm::{Fsm, FsmEvent};
use crate::handlers::HandlerRegistry;
use crate::registry::OptionRegistry;
use crate::telnet::op_command;
use crate::status::Direction;

/// One decoded unit of a Telnet stream: either forwarded application data or
/// a signal the caller must act on. Negotiation and subnegotiation actions
/// are applied to the FSM and written back out automatically; see
/// [`TelnetCodec::set_writer_sink`] note below — since `Encoder` only runs
/// when the caller calls `framed.send`, outbound replies generated while
/// *decoding* are queued in `pending_writes` and drained by
/// [`TelnetCodec::take_pending_writes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Data(Bytes),
    Signal(ProcessingSignal),
    Error(ErrorKind),
}

/// A `Decoder`/`Encoder` pair that frames a raw byte stream as Telnet
/// [`Item`]s, suitable for `tokio_util::codec::Framed`.
///
/// Unlike [`crate::stream::TelnetStream`] this has no transport handle of
/// its own, so it cannot perform Synch (which needs `MSG_OOB`); `AbortOutput`
/// surfaces as a plain [`Item::Signal`] for the caller to handle.
pub struct TelnetCodec {
    fsm: Fsm,
    registry: OptionRegistry,
    handlers: HandlerRegistry,
    config: EngineConfig,
    pending_writes: Vec<Bytes>,
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self {
            fsm: Fsm::new(),
            registry: OptionRegistry::new(),
            handlers: HandlerRegistry::new(),
            config: EngineConfig::new(),
            pending_writes: Vec::new(),
        }
    }
}

impl TelnetCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(mut self, registry: OptionRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    #[must_use]
    pub fn is_enabled(&self, option: u8, dir: Direction) -> bool {
        self.fsm.is_enabled(option, dir)
    }

    /// Drains the outbound bytes generated by negotiation/subnegotiation
    /// replies discovered while decoding. The caller is responsible for
    /// writing these to the sink; `Framed` has no "decoder wants to write"
    /// hook, so this is polled explicitly after each `next()`.
    pub fn take_pending_writes(&mut self) -> Vec<Bytes> {
        core::mem::take(&mut self.pending_writes)
    }

    fn queue_negotiation(&mut self, response: NegotiationResponse) {
        self.pending_writes.push(Bytes::copy_from_slice(&response.to_bytes()));
    }

    fn queue_subnegotiation(&mut self, option: u8, payload: &[u8]) {
        let mut framed = BytesMut::with_capacity(payload.len() + payload.len() / 10 + 5);
        framed.put_u8(op_command::IAC);
        framed.put_u8(op_command::SB);
        framed.put_u8(option);
        for &b in payload {
            framed.put_u8(b);
            if b == op_command::IAC {
                framed.put_u8(op_command::IAC);
            }
        }
        framed.put_u8(op_command::IAC);
        framed.put_u8(op_command::SE);
        self.pending_writes.push(framed.freeze());
    }
}

impl Decoder for TelnetCodec {
    type Item = Item;
    type Error = ErrorKind;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while !src.is_empty() {
            let b = src[0];
            src.advance(1);

            let outcome = self.fsm.process_byte(b, &self.registry, &mut self.handlers, &self.config);

            if let Some(action) = outcome.action {
                match action {
                    Action::Negotiation(response) => self.queue_negotiation(response),
                    Action::RawWrite(bytes) => self.pending_writes.push(bytes),
                    Action::Subnegotiation(sub) => self.queue_subnegotiation(sub.option, &sub.payload),
                }
            }

            if let Some(event) = outcome.event {
                match event {
                    FsmEvent::Error(error) => return Ok(Some(Item::Error(error))),
                    FsmEvent::Signal(signal) => return Ok(Some(Item::Signal(signal))),
                }
            }

            if let Some(byte) = outcome.forward {
                return Ok(Some(Item::Data(Bytes::copy_from_slice(&[byte]))));
            }
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for TelnetCodec {
    type Error = ErrorKind;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let binary = self.fsm.is_enabled(crate::telnet::op_option::BINARY, Direction::Local);
        dst.reserve(item.len() + item.len() / 10 + 2);
        for &b in item.iter() {
            match b {
                op_command::IAC => {
                    dst.put_u8(op_command::IAC);
                    dst.put_u8(op_command::IAC);
                }
                b'\n' if !binary => {
                    dst.put_u8(b'\r');
                    dst.put_u8(b'\n');
                }
                b'\r' if !binary => {
                    dst.put_u8(b'\r');
                    dst.put_u8(0);
                }
                other => dst.put_u8(other),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_data_one_byte_at_a_time() {
        let mut codec = TelnetCodec::new();
        let mut buf = BytesMut::from(&b"Hi"[..]);
        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Item::Data(Bytes::from_static(b"H")));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, Item::Data(Bytes::from_static(b"i")));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn negotiation_reply_is_queued_for_the_caller_to_write() {
        let mut codec = TelnetCodec::new().with_registry({
            let mut registry = OptionRegistry::new();
            registry.upsert(crate::registry::Option::new(crate::telnet::op_option::ECHO, "ECHO").with_local(|| true));
            registry
        });
        let mut buf = BytesMut::from(&[op_command::IAC, op_command::DO, crate::telnet::op_option::ECHO][..]);
        let item = codec.decode(&mut buf).unwrap();
        assert!(item.is_none());
        let pending = codec.take_pending_writes();
        assert_eq!(pending, alloc::vec![Bytes::copy_from_slice(&[op_command::IAC, op_command::WILL, crate::telnet::op_option::ECHO])]);
        assert!(codec.is_enabled(crate::telnet::op_option::ECHO, Direction::Local));
    }

    #[test]
    fn encoder_escapes_iac_and_newline() {
        let mut codec = TelnetCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"a\xFFb\n"), &mut dst).unwrap();
        assert_eq!(&dst[..], &[b'a', 0xFF, 0xFF, b'b', b'\r', b'\n'][..]);
    }
}
