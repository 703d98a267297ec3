// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intel-style platforms.
//!
//! The PCH tells us where it wants to be through the SLP_Sx lines, and we
//! follow: primary rails and RSMRST before S5, PWROK on the way into S0.
//! SLP_S0 drives low-power idle when the host has announced it.

use ap_hooks::HookEvent;
use drv_ap_seq_api::{
    BootMilestone, HostSleepEvent, PowerState, ResetReason, ShutdownReason,
    SleepNotify,
};
use drv_power_signals::{PowerSignals, SignalId, SignalMask};
use serde::Deserialize;

use super::Chipset;
use crate::cx::Cx;
use crate::Trace;

/// When low-power idle entry is allowed once SLP_S0 asserts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum S0ixDebounce {
    /// The last host sleep event was an S0ix suspend.
    HostSleepState,
    /// A suspend notification is still owed.
    NotifyPending,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct X86Policy {
    /// `None` disables S0ix altogether.
    pub s0ix: Option<S0ixDebounce>,
    /// Hold between RSMRST power-good and releasing RSMRST to the PCH.
    pub rsmrst_delay_ms: u32,
    /// Keep RSMRST asserted until we have made it to S5.
    pub rsmrst_after_s5: bool,
    pub sys_reset_pulse_ms: u32,
    pub power_up_retries: u32,
    pub power_up_retry_ms: u32,
    pub power_good_timeout_ms: u32,
}

impl X86Policy {
    pub const DEFAULT: Self = Self {
        s0ix: None,
        rsmrst_delay_ms: 10,
        rsmrst_after_s5: false,
        sys_reset_pulse_ms: 32,
        power_up_retries: 40,
        power_up_retry_ms: 100,
        power_good_timeout_ms: 1000,
    };
}

impl Default for X86Policy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Copy, Clone, Debug)]
pub struct X86Signals {
    pub slp_s0: Option<SignalId>,
    pub slp_s3: SignalId,
    pub slp_s4: SignalId,
    /// Boards without a separate SLP_S5 use SLP_S4 for both.
    pub slp_s5: Option<SignalId>,
    pub rsmrst_in: Option<SignalId>,
    pub rsmrst_out: Option<SignalId>,
    pub all_sys_pwrgd: Option<SignalId>,
    pub sys_reset: Option<SignalId>,
    /// Platform reset from the PCH, asserted while the AP is held in reset.
    /// Its edges go into the boot-time record.
    pub pltrst: Option<SignalId>,
    /// Power-goods that have to stay up from S5 through S0.
    pub pgood_all_core: SignalMask,
    /// What G3->S5 waits for once the primary rails are on.
    pub g3s5_powerup: SignalMask,
    /// All asserted only while the AP is running.
    pub all_s0: SignalMask,
}

use PowerState::*;

const EDGES: &[(PowerState, PowerState)] = &[
    (G3, G3S5),
    (G3S5, S5),
    (G3S5, G3),
    (S5, S5S4),
    (S5, S5G3),
    (S5S4, S4),
    (S4, S4S5),
    (S4, S4S3),
    (S4S3, S3),
    (S4S3, S5G3),
    (S5S3, S3),
    (S5S3, S5G3),
    (S3, S3S0),
    (S3, S3S5),
    (S3, S3S4),
    (S3S4, S4),
    (S4S5, S5),
    (S3S0, S0),
    (S3S0, S3S5),
    (S0, S0S3),
    (S0, S0S0ix),
    (S0S3, S3),
    (S0S0ix, S0ix),
    (S0ix, S0ixS0),
    (S0ixS0, S0),
    (S3S5, S5),
    (S5G3, G3),
];

pub struct X86 {
    sig: X86Signals,
    policy: X86Policy,
    /// Made it through G3->S5 and have not gone back to G3 since.
    s5_up: bool,
    /// PLTRST as of the last pass.
    in_reset: bool,
}

impl X86 {
    pub const LEGAL_EDGES: &'static [(PowerState, PowerState)] = EDGES;

    pub const fn new(sig: X86Signals, policy: X86Policy) -> Self {
        Self {
            sig,
            policy,
            s5_up: false,
            in_reset: false,
        }
    }

    pub fn signals(&self) -> &X86Signals {
        &self.sig
    }

    fn slp_s5(&self) -> SignalId {
        self.sig.slp_s5.unwrap_or(self.sig.slp_s4)
    }

    fn power_lost(&self, cx: &mut Cx<'_, '_>) -> bool {
        if cx.forcing() {
            return true;
        }
        let missing = cx.snapshot().missing(self.sig.pgood_all_core);
        if missing.is_empty() {
            return false;
        }
        cx.power_fail(missing);
        true
    }

    /// Follows RSMRST power-good out to the PCH.
    fn handle_rsmrst(&self, cx: &mut Cx<'_, '_>) {
        let (Some(input), Some(output)) =
            (self.sig.rsmrst_in, self.sig.rsmrst_out)
        else {
            return;
        };
        let signals = cx.signals();
        let Ok(level_in) = signals.get_level(input) else {
            return;
        };
        let Ok(level_out) = signals.get_level(output) else {
            return;
        };
        let want = level_in && (self.s5_up || !self.policy.rsmrst_after_s5);
        if want == level_out {
            return;
        }

        cx.board().before_rsmrst(want);
        if want {
            cx.delay_ms(self.policy.rsmrst_delay_ms);
        }
        if let Err(e) = signals.set_level(output, want) {
            cx.trace(Trace::SignalError(e));
            return;
        }
        cx.board().after_rsmrst(want);
        cx.trace(Trace::Rsmrst(want));
        if want {
            cx.boot_milestone(BootMilestone::Rsmrst);
        }
    }

    fn track_pltrst(&mut self, cx: &mut Cx<'_, '_>) {
        let Some(pltrst) = self.sig.pltrst else {
            return;
        };
        let snap = cx.snapshot();
        if !snap.valid.has(pltrst) {
            return;
        }
        let held = snap.asserted.has(pltrst);
        if held == self.in_reset {
            return;
        }
        self.in_reset = held;
        cx.trace(Trace::Pltrst(held));
        cx.boot_milestone(if held {
            BootMilestone::PltrstLow
        } else {
            BootMilestone::PltrstHigh
        });
    }

    /// S5 only moves on once the rails and RSMRST power-good are up.
    fn rails_ready(&self, cx: &Cx<'_, '_>) -> bool {
        let rsmrst = self
            .sig
            .rsmrst_in
            .map_or(true, |id| cx.snapshot().valid_and_on(id.mask()));
        rsmrst && cx.board().check_power_rails_enabled(cx.signals())
    }

    fn power_up_allowed(&self, cx: &mut Cx<'_, '_>) -> bool {
        let tries = self.policy.power_up_retries.max(1);
        for attempt in 1..=tries {
            if cx.board().can_boot_ap() {
                return true;
            }
            if attempt < tries {
                cx.delay_ms(self.policy.power_up_retry_ms);
            }
        }
        false
    }

    fn s0ix_entry_allowed(&self, cx: &Cx<'_, '_>) -> bool {
        let (Some(mode), Some(slp_s0)) = (self.policy.s0ix, self.sig.slp_s0)
        else {
            return false;
        };
        if !cx.snapshot().valid_and_on(slp_s0.mask()) {
            return false;
        }
        cx.with_sleep(|t| match mode {
            S0ixDebounce::HostSleepState => {
                t.host_state == HostSleepEvent::S0ixSuspend
            }
            S0ixDebounce::NotifyPending => t.notify == SleepNotify::Suspend,
        })
    }

    fn g3s5(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        if cx.forcing() {
            return G3;
        }
        if !self.power_up_allowed(cx) {
            cx.trace(Trace::PowerUpInhibited);
            cx.force_shutdown(ShutdownReason::BatteryInhibit);
            return G3;
        }

        let (signals, clock) = (cx.signals(), cx.clock());
        if let Err(e) = cx.board().assert_primary_rails(signals, clock) {
            cx.trace(Trace::SignalError(e));
        }
        cx.boot_milestone(BootMilestone::Arail);

        let powered = cx.wait_for(
            self.sig.g3s5_powerup,
            self.policy.power_good_timeout_ms,
        );
        self.handle_rsmrst(cx);

        cx.take_pending_shutdown();
        if cx.forcing() {
            return self.abort_power_up(cx);
        }
        if powered.is_err() {
            cx.force_shutdown(ShutdownReason::Wait);
            return self.abort_power_up(cx);
        }

        cx.notify(HookEvent::PreInit);
        self.s5_up = true;
        S5
    }

    /// Backs out of a G3->S5 that got as far as the primary rails. The
    /// teardown leaves them up on boards that stop at S5.
    fn abort_power_up(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        let signals = cx.signals();
        if let Err(e) = cx.board().deassert_primary_rails(signals) {
            cx.trace(Trace::SignalError(e));
        }
        G3
    }

    fn startup(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        if self.power_lost(cx) {
            return S5G3;
        }
        cx.notify(HookEvent::Startup);
        cx.reset_host_sleep_tracking();
        S3
    }

    fn resume(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        if self.power_lost(cx) {
            return S3S5;
        }
        if let Some(pg) = self.sig.all_sys_pwrgd {
            let timeout = self.policy.power_good_timeout_ms;
            if cx.wait_for(pg.mask(), timeout).is_err() {
                cx.force_shutdown(ShutdownReason::Wait);
                return S3S5;
            }
        }
        let signals = cx.signals();
        if let Err(e) = cx.board().assert_pwrok(signals, cx.clock()) {
            cx.trace(Trace::SignalError(e));
        }
        if cx.config().resume_init_hooks {
            cx.notify(HookEvent::ResumeInit);
        }
        cx.notify(HookEvent::Resume);
        S0
    }

    fn running(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        let snap = cx.snapshot();
        if self.power_lost(cx) || snap.valid_and_on(self.sig.slp_s3.mask()) {
            return S0S3;
        }
        if self.s0ix_entry_allowed(cx) {
            return S0S0ix;
        }

        // The host's S0ix resume arrives after we are back in S0.
        let resume = cx.with_sleep(|t| {
            if t.notify != SleepNotify::Resume {
                return false;
            }
            t.notify = SleepNotify::None;
            core::mem::take(&mut t.suspend_notified)
        });
        if resume {
            cx.notify(HookEvent::Resume);
        }
        S0
    }

    fn suspend(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        // Already sent if we came here by way of S0ix.
        if !cx.with_sleep(|t| t.suspend_notified) {
            cx.notify(HookEvent::Suspend);
            if cx.config().resume_init_hooks {
                cx.notify(HookEvent::SuspendComplete);
            }
        }
        let signals = cx.signals();
        if let Err(e) = cx.board().deassert_pwrok(signals) {
            cx.trace(Trace::SignalError(e));
        }
        cx.reset_host_sleep_tracking();
        S3
    }

    fn enter_s0ix(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        let announced = cx.with_sleep(|t| {
            if t.notify != SleepNotify::Suspend {
                return false;
            }
            t.notify = SleepNotify::None;
            t.suspend_notified = true;
            true
        });
        if announced {
            cx.notify(HookEvent::Suspend);
            if cx.config().resume_init_hooks {
                cx.notify(HookEvent::SuspendComplete);
            }
        }
        cx.notify(HookEvent::S0ixSuspend);
        cx.count_sleep_transition();
        cx.cancel_sleep_timeout();
        S0ix
    }

    fn idle(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        let snap = cx.snapshot();
        // Always out through S0ixS0, so the S0ixResume goes out before S0
        // deals with whatever woke us.
        if self.power_lost(cx) || snap.valid_and_on(self.sig.slp_s3.mask()) {
            return S0ixS0;
        }
        let mut awake = self.sig.slp_s3.mask();
        if let Some(slp_s0) = self.sig.slp_s0 {
            awake |= slp_s0.mask();
        }
        if snap.valid_and_off(awake) {
            return S0ixS0;
        }
        S0ix
    }

    fn leave_s0ix(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        if cx.config().resume_init_hooks
            && cx.with_sleep(|t| t.suspend_notified)
        {
            cx.notify(HookEvent::ResumeInit);
        }
        cx.notify(HookEvent::S0ixResume);
        cx.count_sleep_transition();
        cx.rearm_sleep_timeout();
        S0
    }

    fn shutdown(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        cx.notify(HookEvent::Shutdown);
        let signals = cx.signals();
        if let Err(e) = cx.board().deassert_pwrok(signals) {
            cx.trace(Trace::SignalError(e));
        }
        cx.notify(HookEvent::ShutdownComplete);
        S5
    }

    fn hard_off(&mut self, cx: &mut Cx<'_, '_>) -> PowerState {
        let signals = cx.signals();
        if let Err(e) = cx.board().deassert_primary_rails(signals) {
            cx.trace(Trace::SignalError(e));
        }
        self.s5_up = false;
        G3
    }
}

impl Chipset for X86 {
    fn init_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        sysjump: bool,
    ) -> PowerState {
        self.in_reset = self
            .sig
            .pltrst
            .is_some_and(|id| cx.snapshot().valid_and_on(id.mask()));
        if !sysjump {
            // Nothing we didn't turn on ourselves should be on.
            let board = cx.board();
            let signals = cx.signals();
            let r = board
                .deassert_pwrok(signals)
                .and_then(|()| board.deassert_primary_rails(signals));
            if let Err(e) = r {
                cx.trace(Trace::SignalError(e));
            }
            self.s5_up = false;
            return G3;
        }

        let snap = cx.refresh();
        if snap.has(self.sig.all_s0) {
            self.s5_up = true;
            return S0;
        }
        if snap.has(self.sig.g3s5_powerup) {
            self.s5_up = true;
            return S5;
        }
        cx.teardown(ShutdownReason::Init);
        self.s5_up = false;
        G3
    }

    fn handle_state(
        &mut self,
        cx: &mut Cx<'_, '_>,
        state: PowerState,
    ) -> PowerState {
        self.handle_rsmrst(cx);
        self.track_pltrst(cx);

        let snap = cx.snapshot();
        let asleep = |id: SignalId| snap.valid_and_on(id.mask());
        let awake = |id: SignalId| snap.valid_and_off(id.mask());

        match state {
            G3 => G3,
            G3S5 => self.g3s5(cx),
            S5 => {
                if !cx.forcing()
                    && awake(self.slp_s5())
                    && self.rails_ready(cx)
                {
                    S5S4
                } else {
                    S5
                }
            }
            S5S4 | S3S4 => S4,
            S4 => {
                if self.power_lost(cx) {
                    S4S5
                } else if awake(self.sig.slp_s4) {
                    S4S3
                } else if asleep(self.slp_s5()) {
                    S4S5
                } else {
                    S4
                }
            }
            S4S3 | S5S3 => self.startup(cx),
            S3 => {
                if self.power_lost(cx) {
                    S3S5
                } else if awake(self.sig.slp_s3) {
                    S3S0
                } else if asleep(self.sig.slp_s4) {
                    S3S4
                } else {
                    S3
                }
            }
            S3S0 => self.resume(cx),
            S0 => self.running(cx),
            S0S3 => self.suspend(cx),
            S0S0ix => self.enter_s0ix(cx),
            S0ix => self.idle(cx),
            S0ixS0 => self.leave_s0ix(cx),
            S3S5 | S4S5 => self.shutdown(cx),
            S5G3 => self.hard_off(cx),
        }
    }

    fn legal_edges(&self) -> &'static [(PowerState, PowerState)] {
        EDGES
    }

    fn handle_host_sleep_event(
        &mut self,
        cx: &mut Cx<'_, '_>,
        event: HostSleepEvent,
    ) {
        let Some(slp_s0) = self.sig.slp_s0 else {
            return;
        };
        let signals = cx.signals();
        let r = match event {
            HostSleepEvent::S0ixSuspend => signals.enable_interrupt(slp_s0),
            HostSleepEvent::S0ixResume | HostSleepEvent::DefaultReset => {
                signals.disable_interrupt(slp_s0)
            }
            _ => Ok(()),
        };
        if let Err(e) = r {
            cx.trace(Trace::SignalError(e));
        }
    }

    fn reset(&mut self, cx: &mut Cx<'_, '_>, reason: ResetReason) {
        cx.pulse_reset(
            self.sig.sys_reset,
            self.policy.sys_reset_pulse_ms,
            reason,
        );
    }
}

/// Edge handler for the RSMRST power-good, for interrupt context. A falling
/// edge goes straight through to the PCH; a rising one needs a delay first
/// and is left for the task.
pub fn rsmrst_interrupt(signals: &PowerSignals<'_>, sig: &X86Signals) {
    let (Some(input), Some(output)) = (sig.rsmrst_in, sig.rsmrst_out) else {
        return;
    };
    signals.interrupt(input);
    if signals.get_level(input) == Ok(false)
        && signals.get_level(output) == Ok(true)
    {
        // A failed drop is in the signal log.
        let _ = signals.set_level(output, false);
    }
}
