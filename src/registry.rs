//! Option descriptors and the registry that holds them.
//!
//! Reads dominate once the FSM is running; the registry is still mutable at
//! runtime (an application may register a new option's support mid-session),
//! so it is guarded by a reader/writer lock rather than owned outright by the
//! FSM.

use alloc::collections::BTreeMap;

use crate::status::Direction;
use crate::telnet::op_option;

/// Default cap on a subnegotiation payload.
pub const DEFAULT_MAX_SUBNEGOTIATION_BYTES: usize = 1024;

/// Decides whether a peer-initiated enablement request should be accepted.
///
/// Consulted only for peer-initiated requests (WILL received while NO, DO
/// received while NO); user-initiated requests always attempt negotiation
/// regardless of the predicate.
pub type SupportPredicate = fn() -> bool;

fn always_true() -> bool {
    true
}

fn always_false() -> bool {
    false
}

/// A Telnet option's static description: identity and negotiation policy.
#[derive(Clone, Copy)]
pub struct Option {
    pub id: u8,
    pub name: &'static str,
    supports_local: SupportPredicate,
    supports_remote: SupportPredicate,
    pub supports_subnegotiation: bool,
    pub max_subnegotiation_bytes: usize,
}

impl Option {
    #[must_use]
    pub const fn new(id: u8, name: &'static str) -> Self {
        Self {
            id,
            name,
            supports_local: always_false,
            supports_remote: always_false,
            supports_subnegotiation: false,
            max_subnegotiation_bytes: DEFAULT_MAX_SUBNEGOTIATION_BYTES,
        }
    }

    #[must_use]
    pub const fn with_local(mut self, supported: SupportPredicate) -> Self {
        self.supports_local = supported;
        self
    }

    #[must_use]
    pub const fn with_remote(mut self, supported: SupportPredicate) -> Self {
        self.supports_remote = supported;
        self
    }

    #[must_use]
    pub const fn with_subnegotiation(mut self, max_bytes: usize) -> Self {
        self.supports_subnegotiation = true;
        self.max_subnegotiation_bytes = max_bytes;
        self
    }

    /// Whether this option is acceptable in the given direction: "Local"
    /// means this side may enable it on itself, "Remote" means this side may
    /// ask the peer to enable it / accept the peer enabling it.
    #[must_use]
    pub fn supports(&self, dir: Direction) -> bool {
        match dir {
            Direction::Local => (self.supports_local)(),
            Direction::Remote => (self.supports_remote)(),
        }
    }
}

/// A mapping from option id to [`Option`] descriptor, ordered for
/// deterministic enumeration. Writable at configuration time; once the FSM
/// is running, reads dominate.
#[derive(Clone)]
pub struct OptionRegistry {
    options: BTreeMap<u8, Option>,
}

impl Default for OptionRegistry {
    /// Registers BINARY and SUPPRESS_GO_AHEAD (both directions acceptable)
    /// and STATUS (local acceptable, remote rejected by default).
    fn default() -> Self {
        let mut registry = Self {
            options: BTreeMap::new(),
        };
        registry.upsert(
            Option::new(op_option::BINARY, "BINARY")
                .with_local(always_true)
                .with_remote(always_true),
        );
        registry.upsert(
            Option::new(op_option::SUPPRESS_GO_AHEAD, "SUPPRESS-GO-AHEAD")
                .with_local(always_true)
                .with_remote(always_true),
        );
        registry.upsert(
            Option::new(op_option::STATUS, "STATUS")
                .with_local(always_true)
                .with_remote(always_false)
                .with_subnegotiation(DEFAULT_MAX_SUBNEGOTIATION_BYTES),
        );
        registry
    }
}

impl OptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry with no default options. Useful for embedders that
    /// want full control over the negotiable option set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            options: BTreeMap::new(),
        }
    }

    pub fn upsert(&mut self, option: Option) {
        self.options.insert(option.id, option);
    }

    pub fn remove(&mut self, id: u8) {
        self.options.remove(&id);
    }

    #[must_use]
    pub fn get(&self, id: u8) -> core::option::Option<&Option> {
        self.options.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Option> {
        self.options.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_binary_sga_status() {
        let registry = OptionRegistry::default();
        assert!(registry.get(op_option::BINARY).unwrap().supports(Direction::Local));
        assert!(registry.get(op_option::BINARY).unwrap().supports(Direction::Remote));
        assert!(registry
            .get(op_option::SUPPRESS_GO_AHEAD)
            .unwrap()
            .supports(Direction::Remote));
        let status = registry.get(op_option::STATUS).unwrap();
        assert!(status.supports(Direction::Local));
        assert!(!status.supports(Direction::Remote));
        assert!(status.supports_subnegotiation);
    }

    #[test]
    fn unregistered_option_is_absent() {
        let registry = OptionRegistry::default();
        assert!(registry.get(200).is_none());
    }
}
