// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timestamped trace logs for the power sequencer.
//!
//! A [`Seqlog`] is a fixed-size ring of entries, each carrying the source line
//! that produced it, the time it was recorded, and an arbitrary `Copy +
//! PartialEq` payload. When an entry is recorded with the same line and
//! payload as the most recent one, the older entry's `count` is bumped
//! instead of consuming a new slot, so a state handler that re-logs the same
//! condition on every pass does not wipe out history.
//!
//! Unlike a `static` ring buffer, a `Seqlog` is an ordinary value: the
//! sequencer owns its trace log, and the signal layer keeps its signal-change
//! log inside the same lock as its cached levels. That makes the logs
//! inspectable from tests as well as from a debugger.
//!
//! Entries are normally recorded with [`seqlog_entry!`], which fills in the
//! line number:
//!
//! ```ignore
//! seqlog_entry!(self.trace, now, Trace::Timeout { want, got });
//! ```

#![cfg_attr(target_os = "none", no_std)]

/// Records `payload` at time `now` into the [`Seqlog`] `log`, tagged with the
/// current source line.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! seqlog_entry {
    ($log:expr, $now:expr, $payload:expr) => {{
        let (p, now) = ($payload, $now);
        $crate::Seqlog::entry(&mut $log, line!() as u16, now, p);
    }};
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! seqlog_entry {
    ($log:expr, $now:expr, $payload:expr) => {{
        let _ = &$log;
        let _ = &$now;
        let _ = &$payload;
    }};
}

/// A single [`Seqlog`] entry. `timestamp` is when the first of `count`
/// identical entries was recorded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeqlogEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub timestamp: u64,
    pub payload: T,
}

#[derive(Debug)]
pub struct Seqlog<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [SeqlogEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Seqlog<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [SeqlogEntry {
                line: 0,
                generation: 0,
                count: 0,
                timestamp: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, timestamp: u64, payload: T) {
        // `None` is treated as an out-of-range index, which makes the first
        // insertion land in slot 0 without a special case.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Zero-sized log.
            return;
        };
        *ent = SeqlogEntry {
            line,
            payload,
            timestamp,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// The most recently recorded entry.
    pub fn last(&self) -> Option<&SeqlogEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }

    /// Recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SeqlogEntry<T>> + '_ {
        let start = self.last.map(|l| l + 1).unwrap_or(0);
        let (newer, older) = self.buffer.split_at(start.min(N));
        older
            .iter()
            .chain(newer.iter())
            .filter(|e| e.count != 0)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Counts recorded entries (including folded repeats) whose payload
    /// satisfies `pred`.
    pub fn count_matching(&self, pred: impl Fn(&T) -> bool) -> u32 {
        self.iter()
            .filter(|e| pred(&e.payload))
            .map(|e| e.count)
            .sum()
    }
}
