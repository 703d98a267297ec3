// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{PowerSignals, SignalError, SignalId};

/// A rail enable shared by several independent users.
///
/// Each requester owns one bit. The rail is on while any bit is set, so one
/// user turning its request off never pulls the rail out from under another.
/// The requester mask is what gets preserved across a sysjump.
pub struct SharedRail<'a> {
    signals: &'a PowerSignals<'a>,
    enable: SignalId,
    requests: spin::Mutex<u32>,
}

impl<'a> SharedRail<'a> {
    pub const fn new(
        signals: &'a PowerSignals<'a>,
        enable: SignalId,
    ) -> Self {
        Self {
            signals,
            enable,
            requests: spin::Mutex::new(0),
        }
    }

    /// Sets or clears `requester`'s vote. Returns whether the rail is on
    /// afterwards.
    pub fn request(
        &self,
        requester: u8,
        on: bool,
    ) -> Result<bool, SignalError> {
        let bit = 1u32
            .checked_shl(u32::from(requester))
            .ok_or(SignalError::BadRequester)?;

        let mut requests = self.requests.lock();
        let next = if on { *requests | bit } else { *requests & !bit };
        if (next != 0) != (*requests != 0) {
            self.signals.assert(self.enable, next != 0)?;
        }
        *requests = next;
        Ok(next != 0)
    }

    pub fn requests(&self) -> u32 {
        *self.requests.lock()
    }

    pub fn is_on(&self) -> bool {
        self.requests() != 0
    }

    /// Replaces the requester mask wholesale, as after a sysjump, and drives
    /// the enable to match.
    pub fn restore(&self, mask: u32) -> Result<(), SignalError> {
        let mut requests = self.requests.lock();
        self.signals.assert(self.enable, mask != 0)?;
        *requests = mask;
        Ok(())
    }
}
