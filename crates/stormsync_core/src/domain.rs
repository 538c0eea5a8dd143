//! # Domain Identifiers
//!
//! Domains are numbered from 1 (the parent domain). Slot storage is indexed
//! from 0, so every conversion between the two goes through [`DomainId`].

use std::fmt;
use std::num::NonZeroU32;

/// Maximum number of domains that can be integrated in parallel.
pub const MAX_DOMAINS: usize = 40;

/// A 1-based domain identifier.
///
/// Zero is not a valid domain, which the `NonZeroU32` representation enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainId(NonZeroU32);

impl DomainId {
    /// The outermost (parent) domain.
    pub const PARENT: Self = Self(NonZeroU32::MIN);

    /// Creates a domain ID, or `None` for zero.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw 1-based ID.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based slot index for this domain.
    #[inline]
    #[must_use]
    pub const fn slot_index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Builds the domain ID stored at a 0-based slot index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_slot_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
