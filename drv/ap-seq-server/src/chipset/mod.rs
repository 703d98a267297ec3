// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_ap_seq_api::{HostSleepEvent, PowerState, ResetReason};
use drv_power_signals::SignalMask;

use crate::board::{pwrok_mask, rail_mask, Board};
use crate::cx::Cx;

pub mod arm;
pub mod x86;

/// A chipset family's state handling.
pub trait Chipset {
    /// Picks the state to start in. `sysjump` is set if the AP may already
    /// be running under a previous EC image.
    fn init_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        sysjump: bool,
    ) -> PowerState;

    /// Does the work for `state` and returns the next state, which is
    /// `state` itself if nothing needs to change.
    fn handle_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        state: PowerState,
    ) -> PowerState;

    /// Called for every accepted transition, before the new state becomes
    /// current.
    fn on_transition(
        &mut self,
        _cx: &mut Cx<'_, '_>,
        _from: PowerState,
        _to: PowerState,
    ) {
    }

    fn legal_edges(&self) -> &'static [(PowerState, PowerState)];

    fn is_legal(&self, from: PowerState, to: PowerState) -> bool {
        self.legal_edges().contains(&(from, to))
    }

    /// The outputs that should be on while sitting in `state`. `None` for
    /// transition states, where anything goes.
    fn expected_rails(
        &self,
        board: &dyn Board,
        state: PowerState,
    ) -> Option<SignalMask> {
        default_expected_rails(board, state)
    }

    fn handle_host_sleep_event(
        &mut self,
        _cx: &mut Cx<'_, '_>,
        _event: HostSleepEvent,
    ) {
    }

    fn reset(&mut self, cx: &mut Cx<'_, '_>, reason: ResetReason);
}

pub fn default_expected_rails(
    board: &dyn Board,
    state: PowerState,
) -> Option<SignalMask> {
    let primary = rail_mask(board.primary_rails());
    let pwrok = pwrok_mask(board.pwrok_signals());
    match state {
        PowerState::G3 => Some(SignalMask::EMPTY),
        PowerState::S5 | PowerState::S4 | PowerState::S3 => Some(primary),
        PowerState::S0 | PowerState::S0ix => Some(primary | pwrok),
        _ => None,
    }
}
