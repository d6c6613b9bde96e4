//! Per-option Q-Method state and the 256-entry status table.
//!
//! Keeps the packed-byte, allocation-free representation of a plain
//! support/enabled bitmask, but widens each side from a single bit to the
//! full RFC 1143 four-state machine (`NO`/`YES`/`WANTNO`/`WANTYES`) plus its
//! one-bit negotiation queue, since a bitmask alone can't represent "we
//! asked to enable this and are waiting on a reply" without looping on
//! crossed requests.

use core::fmt::{self, Debug, Formatter};

use crate::error::ErrorKind;

/// Which side of the connection an operation concerns.
///
/// "Local" is what this engine does (it sends WILL/WONT, receives DO/DONT).
/// "Remote" is what the peer does (this engine sends DO/DONT, receives
/// WILL/WONT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Direction {
    Local,
    Remote,
}

/// RFC 1143 per-side negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NegotiationState {
    No = 0,
    Yes = 1,
    WantNo = 2,
    WantYes = 3,
}

impl NegotiationState {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => NegotiationState::No,
            1 => NegotiationState::Yes,
            2 => NegotiationState::WantNo,
            _ => NegotiationState::WantYes,
        }
    }

    const fn is_pending(self) -> bool {
        matches!(self, NegotiationState::WantNo | NegotiationState::WantYes)
    }
}

/// The one-bit negotiation queue, meaningful only while the corresponding
/// side is in `WantNo`/`WantYes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Empty,
    Opposite,
}

// Bit layout of the packed status byte:
//   bit 0-1: local_state   bit 2-3: remote_state
//   bit 4:   local_queue   bit 5:   remote_queue
const LOCAL_STATE_SHIFT: u8 = 0;
const REMOTE_STATE_SHIFT: u8 = 2;
const LOCAL_QUEUE_BIT: u8 = 1 << 4;
const REMOTE_QUEUE_BIT: u8 = 1 << 5;
const STATE_MASK: u8 = 0b11;

/// A single option's negotiation state, for both directions, packed into one
/// byte. All operations are O(1) and allocation-free: this table has 256
/// entries per connection and may be hot.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionStatus(u8);

impl OptionStatus {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    fn state(self, dir: Direction) -> NegotiationState {
        let shift = match dir {
            Direction::Local => LOCAL_STATE_SHIFT,
            Direction::Remote => REMOTE_STATE_SHIFT,
        };
        NegotiationState::from_bits(self.0 >> shift)
    }

    fn set_state(&mut self, dir: Direction, state: NegotiationState) {
        let (shift, queue_bit) = match dir {
            Direction::Local => (LOCAL_STATE_SHIFT, LOCAL_QUEUE_BIT),
            Direction::Remote => (REMOTE_STATE_SHIFT, REMOTE_QUEUE_BIT),
        };
        self.0 &= !(STATE_MASK << shift);
        self.0 |= (state as u8) << shift;
        // Entering YES or NO always clears the corresponding queue bit.
        if matches!(state, NegotiationState::Yes | NegotiationState::No) {
            self.0 &= !queue_bit;
        }
    }

    fn queue(self, dir: Direction) -> Queue {
        let bit = match dir {
            Direction::Local => LOCAL_QUEUE_BIT,
            Direction::Remote => REMOTE_QUEUE_BIT,
        };
        if self.0 & bit != 0 {
            Queue::Opposite
        } else {
            Queue::Empty
        }
    }

    /// `true` iff `dir`'s state is YES.
    #[must_use]
    pub fn enabled(self, dir: Direction) -> bool {
        matches!(self.state(dir), NegotiationState::Yes)
    }

    /// `true` iff `dir`'s state is NO. Not the negation of [`Self::enabled`]:
    /// a WANT* state returns `false` for both.
    #[must_use]
    pub fn disabled(self, dir: Direction) -> bool {
        matches!(self.state(dir), NegotiationState::No)
    }

    /// `true` iff `dir`'s state is WANTNO or WANTYES.
    #[must_use]
    pub fn pending(self, dir: Direction) -> bool {
        self.state(dir).is_pending()
    }

    pub fn enable(&mut self, dir: Direction) {
        self.set_state(dir, NegotiationState::Yes);
    }

    pub fn disable(&mut self, dir: Direction) {
        self.set_state(dir, NegotiationState::No);
    }

    pub fn pend_enable(&mut self, dir: Direction) {
        self.set_state(dir, NegotiationState::WantYes);
    }

    pub fn pend_disable(&mut self, dir: Direction) {
        self.set_state(dir, NegotiationState::WantNo);
    }

    /// Set the opposite-request queue bit for `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NegotiationQueueError`] if `dir`'s state is YES
    /// or NO: the queue is meaningful only in a WANT* state.
    pub fn enqueue(&mut self, dir: Direction, option: u8) -> Result<(), ErrorKind> {
        if !self.state(dir).is_pending() {
            return Err(ErrorKind::NegotiationQueueError(option));
        }
        let bit = match dir {
            Direction::Local => LOCAL_QUEUE_BIT,
            Direction::Remote => REMOTE_QUEUE_BIT,
        };
        self.0 |= bit;
        Ok(())
    }

    pub fn dequeue(&mut self, dir: Direction) {
        let bit = match dir {
            Direction::Local => LOCAL_QUEUE_BIT,
            Direction::Remote => REMOTE_QUEUE_BIT,
        };
        self.0 &= !bit;
    }

    #[must_use]
    pub fn queued(self, dir: Direction) -> bool {
        matches!(self.queue(dir), Queue::Opposite)
    }

    /// `true` iff both queue bits are unset whenever their side is not
    /// WANT*, i.e. the packed byte cannot represent a meaningless queue.
    #[must_use]
    pub fn is_valid(self) -> bool {
        (self.state(Direction::Local).is_pending() || !self.queued(Direction::Local))
            && (self.state(Direction::Remote).is_pending() || !self.queued(Direction::Remote))
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub(crate) fn local_state(self) -> NegotiationState {
        self.state(Direction::Local)
    }

    pub(crate) fn remote_state(self) -> NegotiationState {
        self.state(Direction::Remote)
    }

    pub(crate) fn local_queue(self) -> Queue {
        self.queue(Direction::Local)
    }

    pub(crate) fn remote_queue(self) -> Queue {
        self.queue(Direction::Remote)
    }
}

impl Debug for OptionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionStatus")
            .field("local", &self.state(Direction::Local))
            .field("local_queue", &self.queue(Direction::Local))
            .field("remote", &self.state(Direction::Remote))
            .field("remote_queue", &self.queue(Direction::Remote))
            .finish()
    }
}

const TABLE_SIZE: usize = 1 + u8::MAX as usize;

/// The full 256-entry option status table for one connection. All entries
/// start as `{NO, NO, empty, empty}`.
#[derive(Clone)]
pub struct OptionStatusDB {
    entries: [OptionStatus; TABLE_SIZE],
}

impl Default for OptionStatusDB {
    fn default() -> Self {
        Self {
            entries: [OptionStatus::new(); TABLE_SIZE],
        }
    }
}

impl OptionStatusDB {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, option: u8) -> &OptionStatus {
        &self.entries[option as usize]
    }

    pub fn get_mut(&mut self, option: u8) -> &mut OptionStatus {
        &mut self.entries[option as usize]
    }

    /// Options currently `YES` in the given direction, in ascending option
    /// id order. Used to build the STATUS (option 5) reply payload.
    pub fn enabled_options(&self, dir: Direction) -> impl Iterator<Item = u8> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(move |(opt, status)| status.enabled(dir).then_some(opt as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_yes_or_no_clears_queue() {
        let mut status = OptionStatus::new();
        status.pend_enable(Direction::Local);
        status.enqueue(Direction::Local, 1).unwrap();
        assert!(status.queued(Direction::Local));

        status.enable(Direction::Local);
        assert!(!status.queued(Direction::Local));
        assert!(status.is_valid());

        status.pend_disable(Direction::Remote);
        status.enqueue(Direction::Remote, 1).unwrap();
        status.disable(Direction::Remote);
        assert!(!status.queued(Direction::Remote));
        assert!(status.is_valid());
    }

    #[test]
    fn enqueue_rejected_outside_want_states() {
        let mut status = OptionStatus::new();
        assert_eq!(
            status.enqueue(Direction::Local, 42),
            Err(ErrorKind::NegotiationQueueError(42))
        );
        status.enable(Direction::Local);
        assert_eq!(
            status.enqueue(Direction::Local, 42),
            Err(ErrorKind::NegotiationQueueError(42))
        );
    }

    #[test]
    fn disabled_is_not_negation_of_enabled() {
        let mut status = OptionStatus::new();
        status.pend_enable(Direction::Local);
        assert!(!status.enabled(Direction::Local));
        assert!(!status.disabled(Direction::Local));
        assert!(status.pending(Direction::Local));
    }

    #[test]
    fn enabled_options_enumerates_in_order() {
        let mut db = OptionStatusDB::new();
        db.get_mut(5).enable(Direction::Local);
        db.get_mut(1).enable(Direction::Local);
        db.get_mut(1).enable(Direction::Remote);
        let locals: alloc::vec::Vec<u8> = db.enabled_options(Direction::Local).collect();
        assert_eq!(locals, alloc::vec![1, 5]);
        let remotes: alloc::vec::Vec<u8> = db.enabled_options(Direction::Remote).collect();
        assert_eq!(remotes, alloc::vec![1]);
    }
}
