// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

/// Index of a signal in the board's signal table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SignalId(pub u8);

impl SignalId {
    pub const fn mask(self) -> SignalMask {
        SignalMask::from_bits_retain(1 << self.0)
    }
}

bitflags! {
    /// A set of signals, one bit per [`SignalId`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SignalMask: u32 {
        const _ = !0;
    }
}

impl SignalMask {
    pub const EMPTY: Self = Self::empty();

    pub const fn of(ids: &[SignalId]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < ids.len() {
            bits |= 1 << ids[i].0;
            i += 1;
        }
        Self::from_bits_retain(bits)
    }

    pub const fn has(self, id: SignalId) -> bool {
        self.intersects(id.mask())
    }

    pub fn ids(self) -> impl Iterator<Item = SignalId> {
        let bits = self.bits();
        (0..32u8).filter(move |i| bits & (1 << i) != 0).map(SignalId)
    }
}

impl From<SignalId> for SignalMask {
    fn from(id: SignalId) -> Self {
        id.mask()
    }
}

/// A consistent view of every signal at one instant.
///
/// `asserted` is polarity-adjusted: a set bit means the signal is in its
/// active state regardless of whether that is electrically high or low. A
/// signal whose last read failed is clear in `valid` and never satisfies a
/// condition that mentions it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub asserted: SignalMask,
    pub valid: SignalMask,
}

impl SignalSnapshot {
    /// True if every signal in `mask` is valid and is asserted exactly when
    /// it is in `want`. An empty `mask` always matches.
    pub fn matches(&self, want: SignalMask, mask: SignalMask) -> bool {
        self.valid.contains(mask) && (self.asserted & mask) == (want & mask)
    }

    /// True if every signal in `want` is valid and asserted.
    pub fn has(&self, want: SignalMask) -> bool {
        self.matches(want, want)
    }

    pub fn valid_and_on(&self, mask: SignalMask) -> bool {
        self.has(mask)
    }

    pub fn valid_and_off(&self, mask: SignalMask) -> bool {
        self.matches(SignalMask::EMPTY, mask)
    }

    /// The signals in `want` that are missing or unreadable.
    pub fn missing(&self, want: SignalMask) -> SignalMask {
        want & !(self.asserted & self.valid)
    }
}
