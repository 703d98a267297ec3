// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_power_signals::EventFlags;
use seq_time::Instant;

/// The sequencer's one blocking primitive.
///
/// The object implementing this normally also provides the sequencer's
/// [`seq_time::Clock`], and `deadline` is in that clock's time base.
pub trait Platform {
    /// Blocks until some bit is posted to `events` or `deadline` passes,
    /// whichever is first, and returns (clearing) the posted bits. Returns 0
    /// if the deadline passed with nothing posted. With no deadline, blocks
    /// until something is posted.
    fn wait_event(
        &self,
        events: &EventFlags,
        deadline: Option<Instant>,
    ) -> u32;
}
