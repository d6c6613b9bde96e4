#![cfg_attr(not(feature = "std"), no_std)]

//! An RFC 854 Telnet protocol engine: a byte-level input state machine, an
//! RFC 1143 "Q Method" option negotiation engine, and (behind the `stream`
//! feature) an async composer over [`tokio::net::TcpStream`] that adds
//! Synch/urgent-data handling on top.
//!
//! The crate is split the way the protocol itself is layered:
//!
//! - [`telnet`] — the raw command/option byte constants.
//! - [`status`] and [`registry`] — per-option negotiation state and the
//!   table of which options this engine supports.
//! - [`qmethod`] — the RFC 1143 negotiation decision tables.
//! - [`fsm`] — the 7-state byte-level parser that drives `qmethod` and
//!   recognizes commands, subnegotiations, and CR handling.
//! - [`action`] / [`handlers`] — what the FSM asks the caller to do, and the
//!   callbacks it invokes along the way.
//! - [`stream`] (feature `stream`) and [`codec`] (feature `tokio-util`) —
//!   two different ways to drive the FSM over an actual transport.
//!
//! `no_std` callers get everything except [`stream`] and [`codec`], which
//! need an async runtime and a real socket.

#[cfg(not(feature = "std"))]
extern crate alloc;
extern crate core;
#[cfg(feature = "std")]
extern crate std as alloc;

pub mod action;
pub mod config;
pub mod error;
pub mod fsm;
pub mod handlers;
pub mod qmethod;
pub mod registry;
pub mod status;
pub mod telnet;
pub mod urgent;

#[cfg(feature = "stream")]
pub mod stream;

#[cfg(feature = "tokio-util")]
pub mod codec;

pub use action::{Action, NegotiationResponse, Subnegotiation};
pub use config::{EngineConfig, ErrorLogger, RejectUnknown, TracingLogger, UnknownOptionHandler};
pub use error::{Error, ErrorKind, ProcessingSignal};
pub use fsm::{ByteOutcome, Fsm, FsmEvent};
pub use handlers::{DisablementHandler, EnablementHandler, HandlerRegistry, SubnegotiationHandler};
pub use registry::{Option as OptionDescriptor, OptionRegistry};
pub use status::{Direction, NegotiationState, OptionStatus, OptionStatusDB, Queue};
pub use urgent::{UrgentDataTracker, UrgentSignal, UrgentState};

#[cfg(feature = "stream")]
pub use stream::{ReadError, TelnetStream};

#[cfg(feature = "tokio-util")]
pub use codec::{Item, TelnetCodec};
