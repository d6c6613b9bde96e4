//! The async stream composer: drives [`crate::fsm::Fsm`]
//! byte-by-byte over a real TCP connection, interleaving outbound writes and
//! Synch/OOB handling.
//!
//! Scoped to `tokio::net::TcpStream` rather than a generic transport trait:
//! RFC 854 Synch needs real `MSG_OOB` semantics, and threading a transport
//! abstraction through that is more machinery than this port needs — see
//! DESIGN.md. Because handler
//! invocation already happens synchronously inside the FSM (see
//! [`crate::action`]), dispatching an `Action` here never needs to spawn a
//! task: it is always exactly one write.

use alloc::sync::Arc;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::TcpStream;
use tokio::sync::RwLock;

use crate::action::{Action, NegotiationResponse};
use crate::config::EngineConfig;
use crate::error::{ErrorKind, ProcessingSignal};
use crate::fsm::{ByteOutcome, Fsm, FsmEvent};
use crate::handlers::HandlerRegistry;
use crate::registry::OptionRegistry;
use crate::status::Direction;
use crate::telnet::op_command;
use crate::urgent::{UrgentDataTracker, UrgentSignal, UrgentState};

const READ_CHUNK: usize = 1024;

/// A signal the FSM could not handle locally and must surface to the
/// caller of [`TelnetStream::async_read_some`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    Protocol(ErrorKind),
    Signal(ProcessingSignal),
}

impl From<ErrorKind> for ReadError {
    fn from(error: ErrorKind) -> Self {
        ReadError::Protocol(error)
    }
}

/// A Telnet-aware wrapper around a TCP connection.
pub struct TelnetStream {
    io: TcpStream,
    fsm: Fsm,
    registry: Arc<RwLock<OptionRegistry>>,
    handlers: HandlerRegistry,
    config: Arc<EngineConfig>,
    input: BytesMut,
    cursor: usize,
    urgent: UrgentDataTracker,
}

impl TelnetStream {
    /// Wraps `io`, enabling the OOB-inline socket option so urgent data
    /// shows up in the ordinary byte stream once its arrival has been
    /// signaled out of band.
    pub fn new(io: TcpStream, registry: Arc<RwLock<OptionRegistry>>, config: Arc<EngineConfig>) -> io::Result<Self> {
        SockRef::from(&io).set_out_of_band_inline(true)?;
        Ok(Self {
            io,
            fsm: Fsm::new(),
            registry,
            handlers: HandlerRegistry::new(),
            config,
            input: BytesMut::with_capacity(READ_CHUNK),
            cursor: 0,
            urgent: UrgentDataTracker::new(),
        })
    }

    #[must_use]
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    #[must_use]
    pub fn is_enabled(&self, option: u8, dir: Direction) -> bool {
        self.fsm.is_enabled(option, dir)
    }

    /// Opportunistic, non-blocking check for pending out-of-band data.
    /// Idempotent: a no-op if nothing is pending or a Synch is already
    /// tracked as outstanding.
    fn launch_wait_for_urgent_data(&self) -> io::Result<()> {
        let mut probe = [core::mem::MaybeUninit::new(0u8)];
        let result = self.io.try_io(Interest::READABLE, || {
            SockRef::from(&self.io).recv_with_flags(&mut probe, libc::MSG_OOB)
        });
        match result {
            Ok(_) => {
                match self.urgent.signal_urgent() {
                    UrgentSignal::Armed | UrgentSignal::ClearedUnexpected => {}
                    UrgentSignal::AlreadyArmed => {
                        self.config
                            .log_error(ErrorKind::InternalError("urgent data signaled twice without an intervening Data Mark"));
                    }
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn try_send_oob(&self, byte: u8) -> io::Result<usize> {
        self.io
            .try_io(Interest::WRITABLE, || SockRef::from(&self.io).send_with_flags(&[byte], libc::MSG_OOB))
    }

    async fn send_oob_byte(&self, byte: u8) -> io::Result<()> {
        loop {
            self.io.writable().await?;
            match self.try_send_oob(byte) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
    }

    async fn fill_input(&mut self) -> Result<(), ErrorKind> {
        self.launch_wait_for_urgent_data().map_err(ErrorKind::from)?;
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.io.read(&mut chunk).await.map_err(ErrorKind::from)?;
        if n == 0 {
            return Err(ErrorKind::from(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection")));
        }
        if self.cursor == self.input.len() {
            self.input.clear();
            self.cursor = 0;
        }
        self.input.put_slice(&chunk[..n]);
        Ok(())
    }

    /// Reads and processes Telnet, delivering up to `dest.len()` application
    /// bytes. Returns the number of bytes delivered and, if processing
    /// stopped early, why.
    ///
    /// A transport error is never deferred past already-buffered bytes: this
    /// only ever fills `input` once it is fully drained (see `fill_input`
    /// below), so a read error can never race ahead of undelivered data that
    /// would otherwise be lost. A write error from `dispatch_action` instead
    /// returns immediately alongside however many bytes this call already
    /// wrote to `dest`, so nothing is silently dropped there either.
    pub async fn async_read_some(&mut self, dest: &mut [u8]) -> (usize, Option<ReadError>) {
        if self.cursor >= self.input.len() {
            if let Err(error) = self.fill_input().await {
                return (0, Some(ReadError::Protocol(error)));
            }
        }

        let mut written = 0usize;
        while written < dest.len() && self.cursor < self.input.len() {
            let b = self.input[self.cursor];
            self.cursor += 1;

            let outcome = {
                let registry = self.registry.read().await;
                self.fsm.process_byte(b, &registry, &mut self.handlers, &self.config)
            };

            match self.apply_outcome(outcome, dest, &mut written).await {
                Ok(None) => {}
                Ok(Some(propagate)) => return (written, Some(propagate)),
                Err(error) => return (written, Some(ReadError::Protocol(error))),
            }
        }

        (written, None)
    }

    async fn apply_outcome(
        &mut self,
        outcome: ByteOutcome,
        dest: &mut [u8],
        written: &mut usize,
    ) -> Result<Option<ReadError>, ErrorKind> {
        if let Some(event) = outcome.event {
            match event {
                FsmEvent::Error(error) => self.config.log_error(error),
                FsmEvent::Signal(signal) => {
                    if let Some(propagate) = self.handle_signal(signal, dest, written).await? {
                        return Ok(Some(propagate));
                    }
                }
            }
        }

        if let Some(byte) = outcome.forward {
            if self.urgent.state() != UrgentState::HasUrgent && *written < dest.len() {
                dest[*written] = byte;
                *written += 1;
            }
        }

        if let Some(action) = outcome.action {
            self.dispatch_action(action).await?;
        }

        Ok(None)
    }

    async fn handle_signal(
        &mut self,
        signal: ProcessingSignal,
        dest: &mut [u8],
        written: &mut usize,
    ) -> Result<Option<ReadError>, ErrorKind> {
        match signal {
            ProcessingSignal::CarriageReturn => {
                if *written < dest.len() {
                    dest[*written] = b'\r';
                    *written += 1;
                }
                Ok(None)
            }
            ProcessingSignal::EraseCharacter => {
                if *written > 0 {
                    *written -= 1;
                    Ok(None)
                } else {
                    Ok(Some(ReadError::Signal(signal)))
                }
            }
            ProcessingSignal::EraseLine => {
                if *written > 0 {
                    *written = 0;
                    Ok(None)
                } else {
                    Ok(Some(ReadError::Signal(signal)))
                }
            }
            ProcessingSignal::AbortOutput => {
                self.async_send_synch().await?;
                Ok(Some(ReadError::Signal(signal)))
            }
            ProcessingSignal::DataMark => {
                if !self.urgent.observe_data_mark() {
                    self.config.log_notice("unexpected IAC DM without a preceding OOB notification");
                }
                self.launch_wait_for_urgent_data().map_err(ErrorKind::from)?;
                Ok(None)
            }
            ProcessingSignal::Break | ProcessingSignal::Interrupt => Ok(Some(ReadError::Signal(signal))),
        }
    }

    async fn dispatch_action(&mut self, action: Action) -> Result<(), ErrorKind> {
        match action {
            Action::Negotiation(response) => self.async_write_negotiation(response).await,
            Action::RawWrite(bytes) => self.async_write_raw(&bytes).await,
            Action::Subnegotiation(sub) => self.async_write_subnegotiation(sub.option, &sub.payload).await,
        }
    }

    /// Escapes `src` (doubling `IAC`, and — outside BINARY — translating
    /// `LF` to `CR LF` and `CR` to `CR NUL`) and writes the result.
    pub async fn async_write_some(&mut self, src: &[u8]) -> Result<usize, ErrorKind> {
        let escaped = self.escape_outgoing(src);
        self.io.write_all(&escaped).await.map_err(ErrorKind::from)?;
        Ok(src.len())
    }

    fn escape_outgoing(&self, src: &[u8]) -> Bytes {
        let binary = self.fsm.is_enabled(crate::telnet::op_option::BINARY, Direction::Local);
        let mut out = BytesMut::with_capacity(src.len() + src.len() / 10 + 2);
        for &b in src {
            match b {
                op_command::IAC => {
                    out.put_u8(op_command::IAC);
                    out.put_u8(op_command::IAC);
                }
                b'\n' if !binary => {
                    out.put_u8(b'\r');
                    out.put_u8(b'\n');
                }
                b'\r' if !binary => {
                    out.put_u8(b'\r');
                    out.put_u8(0);
                }
                other => out.put_u8(other),
            }
        }
        out.freeze()
    }

    /// Sends pre-escaped bytes verbatim.
    pub async fn async_write_raw(&mut self, src: &[u8]) -> Result<(), ErrorKind> {
        self.io.write_all(src).await.map_err(ErrorKind::from)
    }

    /// Sends `IAC cmd`.
    pub async fn async_write_command(&mut self, cmd: u8) -> Result<(), ErrorKind> {
        self.io.write_all(&[op_command::IAC, cmd]).await.map_err(ErrorKind::from)
    }

    /// Sends `IAC (WILL|WONT|DO|DONT) opt`.
    pub async fn async_write_negotiation(&mut self, response: NegotiationResponse) -> Result<(), ErrorKind> {
        self.io.write_all(&response.to_bytes()).await.map_err(ErrorKind::from)
    }

    /// Frames `payload` as `IAC SB opt … IAC SE`, escaping `IAC` inside it.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidSubnegotiation`] if `opt` neither supports
    /// subnegotiation in the registry nor is currently enabled in either
    /// direction.
    pub async fn async_write_subnegotiation(&mut self, opt: u8, payload: &[u8]) -> Result<(), ErrorKind> {
        let allowed = {
            let registry = self.registry.read().await;
            registry.get(opt).is_some_and(|d| d.supports_subnegotiation)
        } || self.fsm.is_enabled(opt, Direction::Local)
            || self.fsm.is_enabled(opt, Direction::Remote);
        if !allowed {
            return Err(ErrorKind::InvalidSubnegotiation(opt));
        }

        let mut framed = BytesMut::with_capacity(payload.len() + payload.len() / 10 + 5);
        framed.put_u8(op_command::IAC);
        framed.put_u8(op_command::SB);
        framed.put_u8(opt);
        for &b in payload {
            framed.put_u8(b);
            if b == op_command::IAC {
                framed.put_u8(op_command::IAC);
            }
        }
        framed.put_u8(op_command::IAC);
        framed.put_u8(op_command::SE);
        self.io.write_all(&framed).await.map_err(ErrorKind::from)
    }

    /// Sends a Synch: three NULs (the first out-of-band) followed by `IAC
    /// DM`.
    pub async fn async_send_synch(&mut self) -> Result<(), ErrorKind> {
        self.send_oob_byte(0).await.map_err(ErrorKind::from)?;
        self.io
            .write_all(&[0, 0, op_command::IAC, op_command::DM])
            .await
            .map_err(ErrorKind::from)
    }

    /// Drives the Q-Method engine and writes any resulting negotiation.
    ///
    /// # Errors
    ///
    /// See [`crate::qmethod::request_option`].
    pub async fn async_request_option(&mut self, opt: u8, dir: Direction) -> Result<(), ErrorKind> {
        let response = {
            let registry = self.registry.read().await;
            self.fsm.request_option(opt, dir, &registry, &self.config)?
        };
        if let Some(response) = response {
            self.async_write_negotiation(response).await?;
        }
        Ok(())
    }

    /// Drives the Q-Method engine and writes any resulting negotiation.
    pub async fn async_disable_option(&mut self, opt: u8, dir: Direction) -> Result<(), ErrorKind> {
        let response = self.fsm.disable_option(opt, dir, &mut self.handlers, &self.config);
        if let Some(response) = response {
            self.async_write_negotiation(response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let accept = listener.accept();
        let (connected, (accepted, _)) = tokio::join!(connect, accept);
        (connected.unwrap(), accepted)
    }

    #[tokio::test]
    async fn pure_data_round_trips() {
        let (client, server) = loopback_pair().await;
        let registry = Arc::new(RwLock::new(OptionRegistry::new()));
        let config = Arc::new(EngineConfig::new());
        let mut stream = TelnetStream::new(server, registry, config).unwrap();

        let mut client = client;
        client.write_all(b"Hello").await.unwrap();

        let mut dest = [0u8; 16];
        let (n, err) = stream.async_read_some(&mut dest).await;
        assert!(err.is_none());
        assert_eq!(&dest[..n], b"Hello");
    }

    #[tokio::test]
    async fn peer_do_echo_triggers_will_reply() {
        let (mut client, server) = loopback_pair().await;
        let mut registry_inner = OptionRegistry::new();
        registry_inner.upsert(
            crate::registry::Option::new(crate::telnet::op_option::ECHO, "ECHO").with_local(|| true),
        );
        let registry = Arc::new(RwLock::new(registry_inner));
        let config = Arc::new(EngineConfig::new());
        let mut stream = TelnetStream::new(server, registry, config).unwrap();

        client
            .write_all(&[op_command::IAC, op_command::DO, crate::telnet::op_option::ECHO])
            .await
            .unwrap();

        let mut dest = [0u8; 16];
        let (n, err) = stream.async_read_some(&mut dest).await;
        assert!(err.is_none());
        assert_eq!(n, 0);
        assert!(stream.is_enabled(crate::telnet::op_option::ECHO, Direction::Local));

        let mut reply = [0u8; 3];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [op_command::IAC, op_command::WILL, crate::telnet::op_option::ECHO]);
    }

    #[tokio::test]
    async fn abort_output_is_propagated_to_caller() {
        let (mut client, server) = loopback_pair().await;
        let registry = Arc::new(RwLock::new(OptionRegistry::new()));
        let config = Arc::new(EngineConfig::new());
        let mut stream = TelnetStream::new(server, registry, config).unwrap();

        client
            .write_all(&[op_command::IAC, op_command::AO])
            .await
            .unwrap();

        let mut dest = [0u8; 16];
        let (n, err) = stream.async_read_some(&mut dest).await;
        assert_eq!(n, 0);
        assert_eq!(err, Some(ReadError::Signal(ProcessingSignal::AbortOutput)));
    }
}
