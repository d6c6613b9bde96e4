//! Tracks whether a Telnet "Synch" (urgent/OOB Data Mark) is outstanding.
//!
//! The transport layer delivers urgent data out of band from the normal byte
//! stream; this tracker only records the three-state handshake so the FSM
//! and the stream composer agree on when a Data Mark is expected versus
//! unsolicited. State transitions are compare-and-swap so the tracker can be
//! shared between the read loop and whatever task is waiting on urgent data
//! without a lock.

use core::sync::atomic::{AtomicU8, Ordering};

const NO_URGENT: u8 = 0;
const HAS_URGENT: u8 = 1;
const UNEXPECTED_DATA_MARK: u8 = 2;

/// The outcome of a [`UrgentDataTracker::signal_urgent`] call, distinguishing
/// the three cases the transport's OOB notification can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgentSignal {
    /// `NoUrgent` -> `HasUrgent`: the common case, a Data Mark is now
    /// expected in the normal stream.
    Armed,
    /// The tracker was already `HasUrgent`; a second OOB notification
    /// arrived before the first Data Mark was observed. The engine treats
    /// this as an internal invariant violation rather than silently
    /// discarding it, since the transport should not signal urgent data
    /// twice without an intervening Data Mark.
    AlreadyArmed,
    /// The tracker was latched `UnexpectedDataMark`; the new OOB signal
    /// clears that latch back to `NoUrgent` rather than leaving a stale
    /// unexpected-mark record sitting under a fresh Synch.
    ClearedUnexpected,
}

/// The three states of the urgent-data handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgentState {
    /// No Synch is outstanding.
    NoUrgent,
    /// The transport signaled OOB data and a Data Mark (IAC DM) is expected
    /// in the normal stream.
    HasUrgent,
    /// A Data Mark arrived without a preceding OOB signal.
    UnexpectedDataMark,
}

impl UrgentState {
    const fn to_bits(self) -> u8 {
        match self {
            UrgentState::NoUrgent => NO_URGENT,
            UrgentState::HasUrgent => HAS_URGENT,
            UrgentState::UnexpectedDataMark => UNEXPECTED_DATA_MARK,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits {
            HAS_URGENT => UrgentState::HasUrgent,
            UNEXPECTED_DATA_MARK => UrgentState::UnexpectedDataMark,
            _ => UrgentState::NoUrgent,
        }
    }
}

/// Lock-free tracker for the urgent-data handshake, shared between the
/// transport's OOB notification path and the byte-level FSM.
#[derive(Default)]
pub struct UrgentDataTracker(AtomicU8);

impl UrgentDataTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(NO_URGENT))
    }

    #[must_use]
    pub fn state(&self) -> UrgentState {
        UrgentState::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Called by the transport when it observes OOB data on the socket.
    ///
    /// Reports which of the three transitions occurred so the caller can log
    /// the `AlreadyArmed` case as an internal error rather than have it pass
    /// silently.
    pub fn signal_urgent(&self) -> UrgentSignal {
        match self.0.compare_exchange(
            NO_URGENT,
            HAS_URGENT,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => UrgentSignal::Armed,
            Err(HAS_URGENT) => UrgentSignal::AlreadyArmed,
            Err(_) => {
                self.0.store(NO_URGENT, Ordering::Release);
                UrgentSignal::ClearedUnexpected
            }
        }
    }

    /// Called by the FSM when it processes an `IAC DM` in the normal stream.
    ///
    /// Returns `true` if this Data Mark was expected (clears the pending
    /// state back to `NoUrgent`); `false` if it arrived unsolicited, in
    /// which case the tracker moves to `UnexpectedDataMark` for the caller
    /// to log.
    pub fn observe_data_mark(&self) -> bool {
        match self.0.compare_exchange(
            HAS_URGENT,
            NO_URGENT,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(NO_URGENT) => {
                self.0.store(UNEXPECTED_DATA_MARK, Ordering::Release);
                false
            }
            Err(_) => false,
        }
    }

    /// Clears any `UnexpectedDataMark` latch after it has been logged.
    pub fn acknowledge_unexpected(&self) {
        let _ = self.0.compare_exchange(
            UNEXPECTED_DATA_MARK,
            NO_URGENT,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_data_mark_clears_state() {
        let tracker = UrgentDataTracker::new();
        assert_eq!(tracker.signal_urgent(), UrgentSignal::Armed);
        assert_eq!(tracker.state(), UrgentState::HasUrgent);
        assert!(tracker.observe_data_mark());
        assert_eq!(tracker.state(), UrgentState::NoUrgent);
    }

    #[test]
    fn unsolicited_data_mark_latches_unexpected() {
        let tracker = UrgentDataTracker::new();
        assert!(!tracker.observe_data_mark());
        assert_eq!(tracker.state(), UrgentState::UnexpectedDataMark);
        tracker.acknowledge_unexpected();
        assert_eq!(tracker.state(), UrgentState::NoUrgent);
    }

    #[test]
    fn repeated_signals_are_idempotent() {
        let tracker = UrgentDataTracker::new();
        assert_eq!(tracker.signal_urgent(), UrgentSignal::Armed);
        assert_eq!(tracker.signal_urgent(), UrgentSignal::AlreadyArmed);
        assert_eq!(tracker.state(), UrgentState::HasUrgent);
    }

    #[test]
    fn signal_while_unexpected_data_mark_clears_it() {
        let tracker = UrgentDataTracker::new();
        assert!(!tracker.observe_data_mark());
        assert_eq!(tracker.state(), UrgentState::UnexpectedDataMark);
        assert_eq!(tracker.signal_urgent(), UrgentSignal::ClearedUnexpected);
        assert_eq!(tracker.state(), UrgentState::NoUrgent);
    }
}
