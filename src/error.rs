//! Error taxonomy and processing signals.
//!
//! Protocol and negotiation-logic errors are plain, `Copy`-friendly values:
//! `process_byte` can return one for almost every byte in a misbehaving
//! stream, so unlike a typical application error type there is no captured
//! backtrace or allocation here.

use core::fmt;

#[cfg(feature = "std")]
use std::error::Error as StdError;

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A command byte appeared where the protocol forbids it (e.g. a bare
    /// `IAC SE` outside a subnegotiation).
    #[error("protocol violation")]
    ProtocolViolation,

    /// The byte following `IAC` was not a recognized command.
    #[error("invalid command byte {0:#04x} after IAC")]
    InvalidCommand(u8),

    /// A negotiation command (WILL/WONT/DO/DONT) could not be processed.
    #[error("invalid negotiation for option {0}")]
    InvalidNegotiation(u8),

    /// A subnegotiation was malformed, for an unsupported option, or had no
    /// registered handler for its sub-command.
    #[error("invalid subnegotiation for option {0}")]
    InvalidSubnegotiation(u8),

    /// A subnegotiation payload exceeded the option's configured cap.
    #[error("subnegotiation for option {0} exceeded its size limit")]
    SubnegotiationOverflow(u8),

    /// The option is not registered, or not supported in the requested
    /// direction.
    #[error("option {0} is not available in the requested direction")]
    OptionNotAvailable(u8),

    /// `enqueue` was called on an option whose state is not WANTNO/WANTYES.
    #[error("negotiation queue operation invalid for option {0} in its current state")]
    NegotiationQueueError(u8),

    /// A subnegotiation or command reply had no registered user handler.
    #[error("no user handler registered for option {0}")]
    UserHandlerNotFound(u8),

    /// Registration was rejected because the option/command is reserved.
    #[error("user handler forbidden for option {0}")]
    UserHandlerForbidden(u8),

    /// An internal invariant was violated; this indicates a bug in the
    /// engine rather than peer misbehavior.
    #[error("internal error: {0}")]
    InternalError(&'static str),

    /// The underlying transport reported an I/O error.
    #[cfg(feature = "std")]
    #[error("transport error: {0}")]
    Transport(TransportError),
}

/// A cloneable, comparable stand-in for [`std::io::Error`].
///
/// The composer needs to stash a deferred transport error until the current
/// batch of buffered bytes has been delivered, and
/// `io::Error` is neither `Clone` nor `PartialEq`, so we capture its kind and
/// message at the boundary.
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: std::io::ErrorKind,
    message: std::string::String,
}

#[cfg(feature = "std")]
impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        ErrorKind::Transport(TransportError::from(err))
    }
}

#[cfg(feature = "std")]
impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        std::io::Error::new(err.kind, err.message)
    }
}

/// The crate's top-level error type. A thin alias today, kept distinct from
/// [`ErrorKind`] so call sites match on `Error` while the taxonomy can grow
/// context-carrying variants without an API break.
pub type Error = ErrorKind;

#[cfg(feature = "std")]
impl StdError for ErrorKind {}

/// "Benign" out-of-band signals that double as errors. Some are handled
/// locally by the stream composer
/// ([`crate::stream`]); others propagate to the caller as the completion
/// error of the read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingSignal {
    /// A bare CR was seen in non-BINARY mode; the composer places it in the
    /// destination buffer before the following byte's outcome is applied.
    CarriageReturn,
    /// EC (Erase Character): the composer should rewind its write pointer by
    /// one, or propagate if it has not written anything yet this call.
    EraseCharacter,
    /// EL (Erase Line): the composer should reset its write pointer to the
    /// start of this call's output, or propagate if nothing has been
    /// written yet.
    EraseLine,
    /// AO (Abort Output): the composer clears its output side buffer and
    /// initiates a Synch.
    AbortOutput,
    /// DM (Data Mark): concludes a Synch; the composer updates the urgent
    /// data tracker.
    DataMark,
    /// BRK (Break). Always propagated to the caller.
    Break,
    /// IP (Interrupt Process). Always propagated to the caller.
    Interrupt,
}

