// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time keeping for the AP power sequencer.
//!
//! Everything in here is expressed in microseconds since EC boot, as an
//! [`Instant`]. The hardware (or a test harness) supplies the time base by
//! implementing [`Clock`]; the rest of the sequencer never reads a clock any
//! other way.
//!
//! Hardware sequencing delays are *minimums*: a rail must be stable for at
//! least so long before the next one is enabled. A `Clock`'s `delay_us` is
//! allowed to come back early (it may be woken by an unrelated event), so
//! anything that cares about a minimum goes through [`delay_at_least`].

#![cfg_attr(target_os = "none", no_std)]

mod timers;

pub use timers::{Multitimer, Repeat, Timer};

/// Microseconds since EC boot.
pub type Instant = u64;

pub const USEC: u64 = 1;
pub const MSEC: u64 = 1_000;
pub const SECOND: u64 = 1_000_000;

/// Source of time and blocking delays.
pub trait Clock {
    /// Current time. Must be monotonic.
    fn now(&self) -> Instant;

    /// Gives up the CPU for roughly `us` microseconds. May return early.
    fn delay_us(&self, us: u64);

    fn delay_ms(&self, ms: u32) {
        self.delay_us(u64::from(ms) * MSEC);
    }
}

/// Delays for at least `us` microseconds, re-arming the underlying delay as
/// many times as needed. Returns the time that actually elapsed.
pub fn delay_at_least<C: Clock + ?Sized>(clock: &C, us: u64) -> u64 {
    let start = clock.now();
    let end = start.saturating_add(us);
    loop {
        let now = clock.now();
        if now >= end {
            return now - start;
        }
        clock.delay_us(end - now);
    }
}

/// Millisecond flavor of [`delay_at_least`].
pub fn msleep_at_least<C: Clock + ?Sized>(clock: &C, ms: u32) -> u64 {
    delay_at_least(clock, u64::from(ms) * MSEC)
}

/// A point in time after which something is considered late.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub const fn at(t: Instant) -> Self {
        Self(t)
    }

    /// A deadline `timeout` microseconds from now.
    pub fn after<C: Clock + ?Sized>(clock: &C, timeout: u64) -> Self {
        Self(clock.now().saturating_add(timeout))
    }

    pub const fn instant(self) -> Instant {
        self.0
    }

    pub fn expired(self, now: Instant) -> bool {
        now >= self.0
    }

    pub fn remaining(self, now: Instant) -> u64 {
        self.0.saturating_sub(now)
    }
}
