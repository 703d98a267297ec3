// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A table of independent deadline timers keyed by an enum.
//!
//! The sequencer has several slow timers running at once (S5 inactivity,
//! hibernate, delayed reboot, host sleep timeout, the periodic poll) but only
//! one place it ever blocks. `Multitimer` keeps all of them and tells the
//! caller the single earliest deadline to block until, via
//! [`Multitimer::next_deadline`].
//!
//! - Create an `enum` naming your timers, and derive `enum_map::Enum` for it.
//! - Arm and disarm timers with `set_timer` / `clear_timer`.
//! - After waking up, feed the current time to `poll`.
//! - Read out what fired with `iter_fired` or `take_fired`.

use enum_map::{EnumArray, EnumMap};

use crate::Instant;

pub struct Multitimer<E: EnumArray<Timer>> {
    timers: EnumMap<E, Timer>,
}

impl<E: EnumArray<Timer> + Copy> Default for Multitimer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EnumArray<Timer> + Copy> Multitimer<E> {
    pub fn new() -> Self {
        Self {
            timers: EnumMap::default(),
        }
    }

    /// Sets the timer chosen by `which` to go off at `deadline`, with optional
    /// auto-repeat behavior. This replaces any prior setting for the timer.
    pub fn set_timer(
        &mut self,
        which: E,
        deadline: Instant,
        repeat: Option<Repeat>,
    ) {
        // A firing that nobody has looked at yet survives a re-arm.
        let fired_but_not_observed = self.timers[which].fired_but_not_observed;
        self.timers[which] = Timer {
            deadline: Some((deadline, repeat)),
            fired_but_not_observed,
        };
    }

    pub fn get_timer(&self, which: E) -> Option<(Instant, Option<Repeat>)> {
        self.timers[which].deadline
    }

    pub fn is_armed(&self, which: E) -> bool {
        self.timers[which].deadline.is_some()
    }

    /// Disarms `which`, also forgetting any firing that has not been observed.
    /// Returns whether the timer was armed.
    pub fn clear_timer(&mut self, which: E) -> bool {
        let t = &mut self.timers[which];
        t.fired_but_not_observed = false;
        t.deadline.take().is_some()
    }

    /// The earliest deadline among armed timers, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .values()
            .filter_map(|timer| timer.deadline)
            .map(|(dl, _repeat)| dl)
            .min()
    }

    /// Marks every timer whose deadline is at or before `now` as fired,
    /// applying repeat settings.
    pub fn poll(&mut self, now: Instant) {
        for timer in self.timers.values_mut() {
            let Some((d, r)) = timer.deadline else {
                continue;
            };
            if d > now {
                continue;
            }
            timer.deadline = r.map(|kind| {
                let next = match kind {
                    Repeat::AfterWake(period) => now.saturating_add(period),
                    Repeat::AfterDeadline(period) => d.saturating_add(period),
                };
                (next, r)
            });
            timer.fired_but_not_observed = true;
        }
    }

    /// Returns an iterator over all timers that have fired since they were
    /// last observed, in declaration order. A timer that fired more than once
    /// shows up once.
    pub fn iter_fired(&mut self) -> impl Iterator<Item = E> + '_ {
        self.timers.iter_mut().filter_map(move |(e, timer)| {
            if core::mem::replace(&mut timer.fired_but_not_observed, false) {
                Some(e)
            } else {
                None
            }
        })
    }

    /// Observes a single timer's firing.
    pub fn take_fired(&mut self, which: E) -> bool {
        let t = &mut self.timers[which];
        core::mem::replace(&mut t.fired_but_not_observed, false)
    }
}

#[derive(Copy, Clone, Default)]
pub struct Timer {
    deadline: Option<(Instant, Option<Repeat>)>,
    fired_but_not_observed: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Repeat {
    AfterWake(u64),
    AfterDeadline(u64),
}
