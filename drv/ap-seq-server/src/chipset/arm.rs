// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PMIC-driven ARM SoCs.
//!
//! There are no sleep lines to follow here: we decide when the AP runs, the
//! PMIC reports whether it managed, and the AP can only ask to suspend. The
//! state handling is layered with [`crate::hsm`]: the architecture level
//! owns the notifications and the S3/S0 decisions, the SoC level drives the
//! PMIC and reset, and the board level forwards to the board's overrides.

use ap_hooks::HookEvent;
use drv_ap_seq_api::{BootMilestone, PowerState, ResetReason, ShutdownReason};
use drv_power_signals::{SignalId, SignalMask};
use serde::Deserialize;

use super::Chipset;
use crate::cx::Cx;
use crate::hsm::{self, HsmError, Level, Request};
use crate::Trace;

use PowerState::*;

#[derive(Copy, Clone, Debug)]
pub struct ArmSignals {
    /// PMIC power-goods; all must be up from S5 on.
    pub pmic_pgood: SignalMask,
    /// Asserted by the AP when it wants to suspend.
    pub ap_suspend: Option<SignalId>,
    /// Asserting this holds the AP in reset.
    pub ap_reset: Option<SignalId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ArmPolicy {
    pub pmic_timeout_ms: u32,
    pub reset_pulse_ms: u32,
}

impl ArmPolicy {
    pub const DEFAULT: Self = Self {
        pmic_timeout_ms: 1000,
        reset_pulse_ms: 10,
    };
}

impl Default for ArmPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const EDGES: &[(PowerState, PowerState)] = &[
    (G3, G3S5),
    (G3S5, S5),
    (G3S5, G3),
    (S5, S5S3),
    (S5, S5G3),
    (S5S3, S3),
    (S5S3, S5G3),
    (S3, S3S0),
    (S3, S3S5),
    (S3S0, S0),
    (S3S0, S3S5),
    (S0, S0S3),
    (S0S3, S3),
    (S3S5, S5),
    (S5G3, G3),
];

fn power_lost(cx: &mut Cx<'_, '_>, pgood: SignalMask) -> bool {
    if cx.forcing() {
        return true;
    }
    let missing = cx.snapshot().missing(pgood);
    if missing.is_empty() {
        return false;
    }
    cx.power_fail(missing);
    true
}

/// Notifications, and the S3/S0 decisions every ARM AP shares.
pub struct ApArch {
    sig: ArmSignals,
    /// The transition state we most recently left.
    left: Option<PowerState>,
}

impl<'s, 'a> Level<PowerState, Cx<'s, 'a>> for ApArch {
    fn entry(&mut self, cx: &mut Cx<'s, 'a>, state: PowerState) {
        let hooks = cx.config().resume_init_hooks;
        match (self.left.take(), state) {
            (_, S3S5) => cx.notify(HookEvent::Shutdown),
            (_, S0S3) => cx.notify(HookEvent::Suspend),
            (Some(S3S5), S5) => cx.notify(HookEvent::ShutdownComplete),
            (Some(S5S3), S3) => cx.notify(HookEvent::Startup),
            (Some(S0S3), S3) if hooks => {
                cx.notify(HookEvent::SuspendComplete)
            }
            (Some(S3S0), S0) => {
                if hooks {
                    cx.notify(HookEvent::ResumeInit);
                }
                cx.notify(HookEvent::Resume);
            }
            _ => (),
        }
    }

    fn run(
        &mut self,
        cx: &mut Cx<'s, 'a>,
        state: PowerState,
        req: &mut Request<PowerState>,
    ) -> Result<(), HsmError> {
        let suspend = self.sig.ap_suspend.map(SignalId::mask);
        match state {
            S3 => {
                if power_lost(cx, self.sig.pmic_pgood) {
                    req.request(S3S5)?;
                } else if suspend
                    .map_or(true, |m| cx.snapshot().valid_and_off(m))
                {
                    req.request(S3S0)?;
                }
            }
            S0 => {
                let asleep =
                    suspend.is_some_and(|m| cx.snapshot().valid_and_on(m));
                if power_lost(cx, self.sig.pmic_pgood) || asleep {
                    req.request(S0S3)?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn exit(&mut self, _cx: &mut Cx<'s, 'a>, state: PowerState) {
        self.left = Some(state);
    }
}

/// The PMIC and the AP's reset line.
pub struct PmicSoc {
    sig: ArmSignals,
    policy: ArmPolicy,
    /// The AP should be running; cleared by going back down to S5.
    want_on: bool,
}

impl PmicSoc {
    fn set_reset(&self, cx: &mut Cx<'_, '_>, held: bool) {
        let Some(line) = self.sig.ap_reset else {
            return;
        };
        if let Err(e) = cx.signals().assert(line, held) {
            cx.trace(Trace::SignalError(e));
        }
    }

    fn rails_off(&self, cx: &mut Cx<'_, '_>) {
        let signals = cx.signals();
        if let Err(e) = cx.board().deassert_primary_rails(signals) {
            cx.trace(Trace::SignalError(e));
        }
    }

    fn pwrok(&self, cx: &mut Cx<'_, '_>, on: bool) {
        let signals = cx.signals();
        let r = if on {
            cx.board().assert_pwrok(signals, cx.clock())
        } else {
            cx.board().deassert_pwrok(signals)
        };
        if let Err(e) = r {
            cx.trace(Trace::SignalError(e));
        }
    }
}

impl<'s, 'a> Level<PowerState, Cx<'s, 'a>> for PmicSoc {
    fn entry(&mut self, cx: &mut Cx<'s, 'a>, state: PowerState) {
        match state {
            G3S5 => {
                let (signals, clock) = (cx.signals(), cx.clock());
                let r = cx.board().assert_primary_rails(signals, clock);
                if let Err(e) = r {
                    cx.trace(Trace::SignalError(e));
                }
                cx.boot_milestone(BootMilestone::Arail);
            }
            S5S3 => self.set_reset(cx, false),
            S3S0 => self.pwrok(cx, true),
            S0S3 => self.pwrok(cx, false),
            S3S5 => {
                self.want_on = false;
                self.set_reset(cx, true);
                self.pwrok(cx, false);
            }
            S5G3 => {
                self.want_on = false;
                self.rails_off(cx);
            }
            _ => (),
        }
    }

    fn run(
        &mut self,
        cx: &mut Cx<'s, 'a>,
        state: PowerState,
        req: &mut Request<PowerState>,
    ) -> Result<(), HsmError> {
        let pgood = self.sig.pmic_pgood;
        match state {
            G3S5 if cx.forcing() => req.request(G3)?,
            G3S5 if !cx.board().can_boot_ap() => {
                cx.trace(Trace::PowerUpInhibited);
                cx.force_shutdown(ShutdownReason::BatteryInhibit);
                req.request(G3)?;
            }
            G3S5 => {
                let powered = cx.wait_for(pgood, self.policy.pmic_timeout_ms);
                cx.take_pending_shutdown();
                if cx.forcing() {
                    self.rails_off(cx);
                    req.request(G3)?;
                } else if powered.is_err() {
                    cx.force_shutdown(ShutdownReason::Wait);
                    self.rails_off(cx);
                    req.request(G3)?;
                } else {
                    cx.notify(HookEvent::PreInit);
                    self.want_on = true;
                    req.request(S5)?;
                }
            }
            S5 => {
                if !cx.forcing() && (self.want_on || cx.take_exit_hard_off())
                {
                    self.want_on = true;
                    req.request(S5S3)?;
                }
            }
            S5S3 => {
                if power_lost(cx, pgood) {
                    req.request(S5G3)?;
                } else {
                    req.request(S3)?;
                }
            }
            S3S0 => {
                if power_lost(cx, pgood) {
                    req.request(S3S5)?;
                } else {
                    req.request(S0)?;
                }
            }
            S0S3 => req.request(S3)?,
            S3S5 => req.request(S5)?,
            S5G3 => req.request(G3)?,
            _ => (),
        }
        Ok(())
    }
}

/// Forwards to the board's entry, exit and run overrides.
pub struct BoardLevel;

impl<'s, 'a> Level<PowerState, Cx<'s, 'a>> for BoardLevel {
    fn entry(&mut self, cx: &mut Cx<'s, 'a>, state: PowerState) {
        cx.board().state_entry(state);
    }

    fn run(
        &mut self,
        cx: &mut Cx<'s, 'a>,
        state: PowerState,
        req: &mut Request<PowerState>,
    ) -> Result<(), HsmError> {
        match cx.board().state_run(state) {
            Some(to) => req.request(to),
            None => Ok(()),
        }
    }

    fn exit(&mut self, cx: &mut Cx<'s, 'a>, state: PowerState) {
        cx.board().state_exit(state);
    }
}

pub struct ArmSoc {
    arch: ApArch,
    soc: PmicSoc,
    board: BoardLevel,
}

impl ArmSoc {
    pub const LEGAL_EDGES: &'static [(PowerState, PowerState)] = EDGES;

    pub const fn new(sig: ArmSignals, policy: ArmPolicy) -> Self {
        Self {
            arch: ApArch { sig, left: None },
            soc: PmicSoc {
                sig,
                policy,
                want_on: false,
            },
            board: BoardLevel,
        }
    }
}

impl Chipset for ArmSoc {
    fn init_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        sysjump: bool,
    ) -> PowerState {
        if !sysjump {
            let signals = cx.signals();
            let board = cx.board();
            let r = board
                .deassert_pwrok(signals)
                .and_then(|()| board.deassert_primary_rails(signals));
            if let Err(e) = r {
                cx.trace(Trace::SignalError(e));
            }
            return G3;
        }

        // Running under the old image: the AP is up if the PMIC is and it
        // is out of reset.
        let snap = cx.refresh();
        if snap.has(self.soc.sig.pmic_pgood) {
            let in_reset = self
                .soc
                .sig
                .ap_reset
                .is_some_and(|r| snap.valid_and_on(r.mask()));
            self.soc.want_on = !in_reset;
            return if in_reset { S5 } else { S0 };
        }
        cx.teardown(ShutdownReason::Init);
        G3
    }

    fn handle_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        state: PowerState,
    ) -> PowerState {
        let Self { arch, soc, board } = self;
        let mut levels: [&mut dyn Level<PowerState, Cx<'_, '_>>; 3] =
            [arch, soc, board];
        match hsm::run(&mut levels, cx, state) {
            Ok(next) => next.unwrap_or(state),
            Err(e) => {
                cx.trace(Trace::Hsm(e));
                state
            }
        }
    }

    fn on_transition(
        &mut self,
        cx: &mut Cx<'_, '_>,
        from: PowerState,
        to: PowerState,
    ) {
        let Self { arch, soc, board } = self;
        let mut levels: [&mut dyn Level<PowerState, Cx<'_, '_>>; 3] =
            [arch, soc, board];
        hsm::exit(&mut levels, cx, from);
        hsm::enter(&mut levels, cx, to);
    }

    fn legal_edges(&self) -> &'static [(PowerState, PowerState)] {
        EDGES
    }

    fn reset(&mut self, cx: &mut Cx<'_, '_>, reason: ResetReason) {
        if cx.state() != S0 {
            cx.trace(Trace::ResetSkipped(reason));
            return;
        }
        cx.pulse_reset(
            self.soc.sig.ap_reset,
            self.soc.policy.reset_pulse_ms,
            reason,
        );
    }
}
