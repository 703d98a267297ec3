// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::sync::atomic::{AtomicU32, Ordering};

/// Wake-up bits for the sequencing task.
///
/// Interrupt handlers and other tasks post bits here; the sequencer's wait
/// primitive blocks until some bit is set (or a deadline passes) and then
/// takes them all at once.
#[derive(Debug, Default)]
pub struct EventFlags(AtomicU32);

impl EventFlags {
    /// A power signal changed.
    pub const SIGNAL: u32 = 1 << 0;
    /// Another context queued a request for the sequencer.
    pub const REQUEST: u32 = 1 << 1;

    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn post(&self, bits: u32) {
        self.0.fetch_or(bits, Ordering::SeqCst);
    }

    /// Returns and clears every posted bit.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::SeqCst)
    }

    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
