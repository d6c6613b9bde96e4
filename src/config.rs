//! Process- or engine-wide configuration surface.
//!
//! Configuration lives on a per-engine `Arc<EngineConfig>` rather than true
//! global state, which keeps multiple engines in one process from stepping
//! on each other's AYT text or logging policy. A process-wide default is
//! still available via
//! [`EngineConfig::shared_default`] for callers who just construct an
//! [`crate::fsm::Fsm`] without supplying one, for parity with an
//! implicit-singleton style.

use alloc::sync::Arc;
use bytes::Bytes;

use crate::error::ErrorKind;
use crate::status::Direction;

/// Receives diagnostic events the engine would otherwise only be able to
/// drop on the floor. Default implementation forwards to `tracing`.
pub trait ErrorLogger: Send + Sync {
    /// A protocol or negotiation-logic error occurred and is being handled
    /// by discarding the offending byte(s) and continuing.
    fn log_error(&self, error: ErrorKind);

    /// A benign, idempotence-related redundancy was observed (e.g. a
    /// `request_option` call on an option already YES).
    fn log_warn(&self, message: &str);

    /// An informational event worth recording but not an error (e.g. the
    /// urgent data tracker's `UnexpectedDataMark` transition).
    fn log_notice(&self, message: &str);
}

/// Default [`ErrorLogger`] that forwards to the `tracing` ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn log_error(&self, error: ErrorKind) {
        tracing::error!(%error, "telnet protocol error");
    }

    fn log_warn(&self, message: &str) {
        tracing::warn!(%message, "telnet negotiation warning");
    }

    fn log_notice(&self, message: &str) {
        tracing::info!(%message, "telnet notice");
    }
}

/// Consulted when the peer proposes an option this side has no
/// [`crate::registry::Option`] entry for, giving an embedder a chance to
/// accept dynamically-defined options instead of always refusing them.
///
/// The default implementation always refuses (returns `false`); the FSM
/// otherwise reports `OptionNotAvailable` for the peer's proposal.
pub trait UnknownOptionHandler: Send + Sync {
    fn accept(&self, option: u8, dir: Direction) -> bool;
}

/// Default [`UnknownOptionHandler`]: always refuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnknown;

impl UnknownOptionHandler for RejectUnknown {
    fn accept(&self, _option: u8, _dir: Direction) -> bool {
        false
    }
}

/// Engine-wide configuration: the AYT reply text, the error logger, and the
/// unknown-option policy.
pub struct EngineConfig {
    pub ayt_response: Bytes,
    logger: Arc<dyn ErrorLogger>,
    unknown_option_handler: Arc<dyn UnknownOptionHandler>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ayt_response: Bytes::from_static(b"\r\nTelnet system is active.\r\n"),
            logger: Arc::new(TracingLogger),
            unknown_option_handler: Arc::new(RejectUnknown),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ayt_response(mut self, response: impl Into<Bytes>) -> Self {
        self.ayt_response = response.into();
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: impl ErrorLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    #[must_use]
    pub fn with_unknown_option_handler(mut self, handler: impl UnknownOptionHandler + 'static) -> Self {
        self.unknown_option_handler = Arc::new(handler);
        self
    }

    pub(crate) fn log_error(&self, error: ErrorKind) {
        self.logger.log_error(error);
    }

    pub(crate) fn log_warn(&self, message: &str) {
        self.logger.log_warn(message);
    }

    pub(crate) fn log_notice(&self, message: &str) {
        self.logger.log_notice(message);
    }

    #[must_use]
    pub fn accepts_unknown_option(&self, option: u8, dir: Direction) -> bool {
        self.unknown_option_handler.accept(option, dir)
    }
}

#[cfg(feature = "std")]
mod shared {
    use super::EngineConfig;
    use alloc::sync::Arc;
    use std::sync::OnceLock;

    static DEFAULT: OnceLock<Arc<EngineConfig>> = OnceLock::new();

    impl EngineConfig {
        /// A process-wide, lazily-initialized default configuration, shared
        /// across every [`crate::fsm::Fsm`] constructed without an explicit
        /// one.
        #[must_use]
        pub fn shared_default() -> Arc<EngineConfig> {
            DEFAULT.get_or_init(|| Arc::new(EngineConfig::default())).clone()
        }
    }
}
